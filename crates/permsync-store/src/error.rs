//! Error taxonomy for remote identity-store calls.
//!
//! Every call site distinguishes three outcome classes: throttled
//! (retryable with a pause), concurrent-modification (skip, another run is
//! mutating the same resource), and everything else (fatal for the run).

use thiserror::Error;

/// Error from a remote identity-store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The service rejected the call under rate limiting.
    #[error("rate limited by identity store{}", retry_after_suffix(.retry_after_secs))]
    Throttled { retry_after_secs: Option<u64> },

    /// Another reconciliation run is mutating the same resource.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Authentication with the identity store failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other service-side error, keyed by HTTP status.
    #[error("identity store error (status {status}): {detail}")]
    Service { status: u16, detail: String },

    /// Network-level failure reaching the service.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service returned a body we could not parse.
    #[error("malformed response: {0}")]
    Parse(String),

    /// Client construction or configuration problem.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),

    /// The retry policy gave up on a retryable error.
    #[error("{message}")]
    MaxRetriesExceeded { attempts: u32, message: String },
}

fn retry_after_suffix(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

impl StoreError {
    /// Whether the retry policy should try this call again.
    ///
    /// Throttling, server-side 5xx responses, and transport failures are
    /// transient; everything else either needs a skip
    /// ([`StoreError::ConcurrentModification`]) or is fatal.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Throttled { .. } | StoreError::Transport(_) => true,
            StoreError::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether another run owns the resource and this operation should be
    /// abandoned for the current pass rather than retried.
    #[must_use]
    pub fn is_concurrent(&self) -> bool {
        matches!(self, StoreError::ConcurrentModification(_))
    }

    /// Short machine-readable code for logs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Throttled { .. } => "THROTTLED",
            StoreError::ConcurrentModification(_) => "CONCURRENT_MODIFICATION",
            StoreError::NotFound(_) => "NOT_FOUND",
            StoreError::Auth(_) => "AUTH_FAILED",
            StoreError::Service { .. } => "SERVICE_ERROR",
            StoreError::Transport(_) => "TRANSPORT_ERROR",
            StoreError::Parse(_) => "MALFORMED_RESPONSE",
            StoreError::InvalidConfig(_) => "INVALID_CONFIG",
            StoreError::MaxRetriesExceeded { .. } => "MAX_RETRIES_EXCEEDED",
        }
    }
}

/// Result alias for identity-store operations.
pub type StoreResult<T> = Result<T, StoreError>;
