//! External signaling seams: job-failure reporting and the downstream
//! completion notification.
//!
//! Both are trait objects so the binary can wire real transports while
//! tests record calls.

use async_trait::async_trait;
use serde::Serialize;

/// Structured payload delivered with a terminal failure signal.
#[derive(Debug, Clone, Serialize)]
pub struct FailureDetails {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FailureDetails {
    /// The standard job-failed payload for this pipeline.
    #[must_use]
    pub fn job_failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: "JobFailed".to_string(),
        }
    }
}

/// Receives the terminal failure signal when a run cannot continue.
#[async_trait]
pub trait FailureReporter: Send + Sync {
    /// Report that the job identified by `job_id` failed.
    ///
    /// Reporting errors must not mask the original failure; implementors
    /// log and swallow their own transport problems.
    async fn report_failure(&self, job_id: &str, details: &FailureDetails);
}

/// Publishes the completion message that lets the downstream assignment
/// system proceed.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    /// Announce that reconciliation for `job_id` finished.
    async fn publish(&self, job_id: &str);
}
