//! Run orchestration.
//!
//! One invocation: snapshot remote state, load desired definitions, loop
//! over definitions (apply then provisioning reconciler), tear down
//! remote-only permission sets, publish the completion message. Strictly
//! sequential throughout; any fatal error reports failure and halts.

use tracing::{error, info};

use permsync_store::{IdentityStore, RetryPolicy};

use crate::apply::ApplyEngine;
use crate::config::EngineConfig;
use crate::deletion::DeletionWorkflow;
use crate::desired::load_definitions;
use crate::error::{EngineError, EngineResult};
use crate::provision::ProvisioningReconciler;
use crate::reader::snapshot_remote_state;
use crate::report::{CompletionNotifier, FailureDetails, FailureReporter};

/// What the hosting trigger delivered to this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Stack teardown notification: acknowledge, do no reconciliation.
    Teardown,
    /// A pipeline job execution carrying the id used for status reporting.
    Job { job_id: String },
}

/// Outcome of a handled invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Teardown acknowledged without work.
    Acknowledged,
    /// Reconciliation ran to completion.
    Reconciled,
}

/// Single-invocation reconciler tying all components together.
pub struct Reconciler<'a> {
    store: &'a dyn IdentityStore,
    retry: RetryPolicy,
    config: &'a EngineConfig,
    reporter: &'a dyn FailureReporter,
    notifier: &'a dyn CompletionNotifier,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn IdentityStore,
        retry: RetryPolicy,
        config: &'a EngineConfig,
        reporter: &'a dyn FailureReporter,
        notifier: &'a dyn CompletionNotifier,
    ) -> Self {
        Self {
            store,
            retry,
            config,
            reporter,
            notifier,
        }
    }

    /// Handle one trigger event.
    ///
    /// On any fatal error the failure is reported with the job id before
    /// the error propagates; definitions already converged are not
    /// re-reported as partial success.
    pub async fn handle(&self, event: &TriggerEvent) -> EngineResult<RunOutcome> {
        match event {
            TriggerEvent::Teardown => {
                info!("teardown notification acknowledged, no reconciliation");
                Ok(RunOutcome::Acknowledged)
            }
            TriggerEvent::Job { job_id } => match self.reconcile().await {
                Ok(()) => {
                    info!(job_id = %job_id, "reconciliation finished, notifying downstream");
                    self.notifier.publish(job_id).await;
                    Ok(RunOutcome::Reconciled)
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "reconciliation failed");
                    self.reporter
                        .report_failure(job_id, &FailureDetails::job_failed(e.to_string()))
                        .await;
                    Err(e)
                }
            },
        }
    }

    async fn reconcile(&self) -> EngineResult<()> {
        let mut remote = snapshot_remote_state(self.store, &self.retry).await?;
        let desired = load_definitions(&self.config.definitions_dir)?;

        let apply = ApplyEngine::new(self.store, &self.retry, self.config);
        let provisioner = ProvisioningReconciler::new(self.store, &self.retry, self.config);

        for definition in desired.values() {
            info!(name = %definition.name, "reconciling definition");
            let Some(id) = apply.converge(definition, &mut remote).await? else {
                continue;
            };
            absorb_concurrent(
                provisioner.reconcile(&definition.name, &id).await,
                &definition.name,
            )?;
        }

        let deletion = DeletionWorkflow::new(self.store, &self.retry, self.config);
        for (name, record) in &remote {
            if !desired.contains_key(name) {
                info!(name = %name, "permission set absent locally, removing");
                absorb_concurrent(deletion.teardown(name, &record.id).await, name)?;
            }
        }

        Ok(())
    }
}

/// Treat a concurrent-modification failure as "another run owns this
/// permission set": skip it for this pass, keep going.
fn absorb_concurrent(result: EngineResult<()>, name: &str) -> EngineResult<()> {
    match result {
        Err(EngineError::Store(e)) if e.is_concurrent() => {
            info!(name = %name, "concurrent reconciliation in progress, skipping");
            Ok(())
        }
        other => other,
    }
}
