//! Webhook-backed implementations of the signaling seams.
//!
//! Transport problems are logged and swallowed: a failed failure-report
//! must not mask the error that triggered it, and a failed completion
//! publish is recoverable by re-running the pipeline stage.

use async_trait::async_trait;
use tracing::{error, info, warn};

use permsync_engine::report::{CompletionNotifier, FailureDetails, FailureReporter};

/// Posts job-failure payloads to the pipeline's failure endpoint.
pub struct WebhookReporter {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookReporter {
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl FailureReporter for WebhookReporter {
    async fn report_failure(&self, job_id: &str, details: &FailureDetails) {
        let Some(url) = &self.url else {
            error!(job_id, message = %details.message, "job failed (no failure endpoint configured)");
            return;
        };
        let payload = serde_json::json!({
            "jobId": job_id,
            "failureDetails": details,
        });
        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(job_id, "failure reported to pipeline");
            }
            Ok(response) => {
                warn!(job_id, status = %response.status(), "failure report rejected");
            }
            Err(e) => {
                warn!(job_id, error = %e, "failure report could not be delivered");
            }
        }
    }
}

/// Publishes the completion message the downstream assignment system
/// waits for.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: Option<String>) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl CompletionNotifier for WebhookNotifier {
    async fn publish(&self, job_id: &str) {
        let Some(url) = &self.url else {
            info!(job_id, "reconciliation complete (no notification channel configured)");
            return;
        };
        let payload = serde_json::json!({ "jobId": job_id });
        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!(job_id, "completion published to downstream channel");
            }
            Ok(response) => {
                warn!(job_id, status = %response.status(), "completion publish rejected");
            }
            Err(e) => {
                warn!(job_id, error = %e, "completion publish could not be delivered");
            }
        }
    }
}
