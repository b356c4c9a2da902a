//! Engine configuration.
//!
//! One explicit struct constructed at startup and passed by reference into
//! every component; nothing here is process-global.

use std::path::PathBuf;
use std::time::Duration;

/// Pacing and defaults for a reconciliation run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding one desired-state JSON file per permission set.
    pub definitions_dir: PathBuf,
    /// Session duration applied when a definition omits `Session_Duration`.
    pub default_session_duration: String,
    /// Pause after every mutating remote call, to stay under the shared
    /// rate limit across concurrent invocations.
    pub call_pause: Duration,
    /// Pause between assignment deletions so the deprovision settles
    /// before the next call.
    pub settle_pause: Duration,
    /// Delay between provisioning-status polls.
    pub poll_interval: Duration,
    /// Upper bound on status polls per permission set; exceeding it fails
    /// the run instead of polling forever.
    pub max_polls: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            definitions_dir: PathBuf::from("permission-sets"),
            default_session_duration: "PT1H".to_string(),
            call_pause: Duration::from_millis(100),
            settle_pause: Duration::from_secs(1),
            poll_interval: Duration::from_secs(2),
            max_polls: 150,
        }
    }
}

impl EngineConfig {
    /// Zero-delay pacing for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            call_pause: Duration::ZERO,
            settle_pause: Duration::ZERO,
            poll_interval: Duration::ZERO,
            max_polls: 10,
            ..Self::default()
        }
    }
}
