//! Engine error type.

use permsync_store::StoreError;
use thiserror::Error;

/// Fatal error that aborts a reconciliation run.
///
/// Throttled and concurrent-modification outcomes never surface here; they
/// are absorbed at the call site (retried or skipped). Whatever reaches
/// this type halts the run and is reported through the failure seam.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A remote call failed non-retryably, or retries were exhausted.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A desired-state record failed validation.
    #[error("malformed definition in {file}: {reason}")]
    MalformedDefinition { file: String, reason: String },

    /// The definitions directory could not be read.
    #[error("cannot read definitions from {path}: {source}")]
    DefinitionsUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A provisioning operation stayed in progress past the poll bound.
    #[error("provisioning of '{name}' still in progress after {polls} polls")]
    ProvisioningTimeout { name: String, polls: u32 },
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
