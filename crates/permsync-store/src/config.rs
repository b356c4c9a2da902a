//! Identity-store client configuration.

use serde::Deserialize;
use std::time::Duration;

/// Connection settings for the identity-provisioning service.
///
/// Constructed once at startup and passed by reference; there is no
/// process-global client state.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the service API, without a trailing slash.
    pub base_url: String,
    /// The provisioning instance all permission sets belong to.
    pub instance_id: String,
    /// Bearer token presented on every request, if the deployment
    /// requires one.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl StoreConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
