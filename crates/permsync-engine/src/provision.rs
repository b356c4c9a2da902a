//! Provisioning reconciler.
//!
//! Detects accounts whose live assignment is not running the latest
//! version of a permission set, triggers one re-provision covering all
//! provisioned accounts, and polls the resulting asynchronous operations
//! until none remain in progress. Polling is bounded: an operation that
//! never leaves the in-progress state fails the run instead of hanging
//! the invocation forever.

use tracing::{debug, info, warn};

use permsync_store::types::{AccountId, PermissionSetId, ProvisioningStatus};
use permsync_store::{IdentityStore, RetryPolicy};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Drift scanner and re-provisioner for one permission set per call.
pub struct ProvisioningReconciler<'a> {
    store: &'a dyn IdentityStore,
    retry: &'a RetryPolicy,
    config: &'a EngineConfig,
}

impl<'a> ProvisioningReconciler<'a> {
    pub fn new(
        store: &'a dyn IdentityStore,
        retry: &'a RetryPolicy,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            store,
            retry,
            config,
        }
    }

    /// Re-provision `id` if any account carries a stale version.
    ///
    /// Re-provisioning always targets all provisioned accounts, trading
    /// precision for simple status tracking; zero drifted accounts means
    /// zero provision calls.
    pub async fn reconcile(&self, name: &str, id: &PermissionSetId) -> EngineResult<()> {
        let accounts = self.provisioned_accounts(id).await?;
        if accounts.is_empty() {
            debug!(name, "not provisioned to any account, nothing to reconcile");
            return Ok(());
        }

        let mut drifted: Vec<AccountId> = Vec::new();
        for account in &accounts {
            let stale = self
                .retry
                .execute("list_stale_permission_sets", || async move {
                    self.store.list_stale_permission_sets(account).await
                })
                .await?;
            if stale.contains(id) {
                drifted.push(account.clone());
            }
        }

        if drifted.is_empty() {
            debug!(name, accounts = accounts.len(), "all accounts on latest version");
            return Ok(());
        }

        info!(
            name,
            drifted = drifted.len(),
            total = accounts.len(),
            "stale accounts found, re-provisioning to all provisioned accounts"
        );
        let request_id = self
            .retry
            .execute("provision_all_accounts", || async move {
                self.store.provision_all_accounts(id).await
            })
            .await?;
        debug!(name, request_id = %request_id, "provisioning requested");

        self.await_quiescence(name, id).await
    }

    async fn provisioned_accounts(&self, id: &PermissionSetId) -> EngineResult<Vec<AccountId>> {
        let mut accounts = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .retry
                .execute("list_provisioned_accounts", || {
                    let token = page_token.clone();
                    async move { self.store.list_provisioned_accounts(id, token.as_deref()).await }
                })
                .await?;
            accounts.extend(page.items);
            match page.next_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(accounts)
    }

    /// Poll until no provisioning operation for `id` reports in-progress.
    ///
    /// The loop exits on any terminal status; a failed terminal status is
    /// logged but does not fail the run. Exceeding the poll bound does.
    async fn await_quiescence(&self, name: &str, id: &PermissionSetId) -> EngineResult<()> {
        let mut pending = self
            .retry
            .execute("list_in_progress_operations", || async move {
                self.store.list_in_progress_operations(id).await
            })
            .await?;

        let mut polls: u32 = 0;
        while let Some(request_id) = pending.last().cloned() {
            if polls >= self.config.max_polls {
                return Err(EngineError::ProvisioningTimeout {
                    name: name.to_string(),
                    polls,
                });
            }
            polls += 1;

            let status = self
                .retry
                .execute("describe_provisioning_operation", || {
                    let request_id = request_id.clone();
                    async move {
                        self.store.describe_provisioning_operation(&request_id).await
                    }
                })
                .await?;

            match status {
                ProvisioningStatus::InProgress => {
                    debug!(name, request_id = %request_id, poll = polls, "provisioning in progress");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                ProvisioningStatus::Succeeded => {
                    debug!(name, request_id = %request_id, "provisioning operation finished");
                    pending.pop();
                }
                ProvisioningStatus::Failed => {
                    warn!(name, request_id = %request_id, "provisioning operation reported failure");
                    pending.pop();
                }
            }
        }

        info!(name, polls, "provisioning settled");
        Ok(())
    }
}
