//! Single-invocation entry point.
//!
//! Parses the trigger event delivered by the pipeline, wires the REST
//! identity store and the signaling webhooks, and hands control to the
//! reconciliation engine. Exit code 0 means the event was handled
//! (including an acknowledged teardown); anything else failed and was
//! reported through the failure seam.

mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use permsync_engine::{EngineConfig, Reconciler, TriggerEvent};
use permsync_store::{RestIdentityStore, RetryPolicy, StoreConfig};

use crate::report::{WebhookNotifier, WebhookReporter};

#[derive(Debug, Parser)]
#[command(name = "permsync", version, about = "Reconcile permission-set definitions against the identity store")]
struct Args {
    /// Path to the trigger-event JSON delivered by the pipeline.
    #[arg(long, env = "PERMSYNC_EVENT_FILE")]
    event_file: PathBuf,

    /// Directory of desired-state definition files.
    #[arg(long, env = "PERMSYNC_DEFINITIONS_DIR", default_value = "permission-sets")]
    definitions_dir: PathBuf,

    /// Base URL of the identity-provisioning service API.
    #[arg(long, env = "IDSTORE_BASE_URL")]
    base_url: String,

    /// Provisioning instance the permission sets belong to.
    #[arg(long, env = "IDSTORE_INSTANCE_ID")]
    instance_id: String,

    /// Bearer token for the identity store, if required.
    #[arg(long, env = "IDSTORE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Session duration applied when a definition omits one.
    #[arg(long, env = "PERMSYNC_DEFAULT_SESSION_DURATION", default_value = "PT1H")]
    default_session_duration: String,

    /// Endpoint that receives the job-failure payload.
    #[arg(long, env = "PERMSYNC_FAILURE_URL")]
    failure_url: Option<String>,

    /// Channel endpoint notified when reconciliation completes.
    #[arg(long, env = "PERMSYNC_COMPLETION_URL")]
    completion_url: Option<String>,

    /// Pause after every mutating remote call, in milliseconds.
    #[arg(long, default_value_t = 100)]
    call_pause_ms: u64,

    /// Pause between assignment deletions, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    settle_pause_ms: u64,

    /// Delay between provisioning-status polls, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    poll_interval_ms: u64,

    /// Upper bound on provisioning-status polls per permission set.
    #[arg(long, default_value_t = 150)]
    max_polls: u32,

    /// Retry attempts for throttled or transient remote failures.
    #[arg(long, default_value_t = 4)]
    max_retries: u32,

    /// Base delay for retry backoff, in seconds.
    #[arg(long, default_value_t = 2)]
    retry_base_delay_secs: u64,
}

/// Trigger event as the pipeline delivers it.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum Event {
    /// Stack teardown notification.
    Teardown,
    /// A pipeline job execution.
    #[serde(rename_all = "camelCase")]
    JobExecution { job_id: String },
}

impl From<Event> for TriggerEvent {
    fn from(event: Event) -> Self {
        match event {
            Event::Teardown => TriggerEvent::Teardown,
            Event::JobExecution { job_id } => TriggerEvent::Job { job_id },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), String> {
    let event: Event = {
        let raw = std::fs::read_to_string(&args.event_file)
            .map_err(|e| format!("cannot read event file {}: {e}", args.event_file.display()))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("cannot parse event file {}: {e}", args.event_file.display()))?
    };

    let store_config = StoreConfig {
        base_url: args.base_url,
        instance_id: args.instance_id,
        api_token: args.api_token,
        request_timeout_secs: 30,
    };
    let store =
        RestIdentityStore::new(&store_config).map_err(|e| format!("store setup failed: {e}"))?;

    let engine_config = EngineConfig {
        definitions_dir: args.definitions_dir,
        default_session_duration: args.default_session_duration,
        call_pause: Duration::from_millis(args.call_pause_ms),
        settle_pause: Duration::from_millis(args.settle_pause_ms),
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        max_polls: args.max_polls,
    };
    let retry = RetryPolicy::new(
        args.max_retries,
        Duration::from_secs(args.retry_base_delay_secs),
    );

    let signal_client = reqwest::Client::new();
    let reporter = WebhookReporter::new(signal_client.clone(), args.failure_url);
    let notifier = WebhookNotifier::new(signal_client, args.completion_url);

    let reconciler = Reconciler::new(&store, retry, &engine_config, &reporter, &notifier);
    let trigger = TriggerEvent::from(event);
    info!(?trigger, "handling trigger event");

    reconciler
        .handle(&trigger)
        .await
        .map(|outcome| info!(?outcome, "run finished"))
        .map_err(|e| format!("reconciliation aborted: {e}"))
}
