//! Apply engine.
//!
//! Executes the operations the diff engine emits, one remote call per
//! operation, with a fixed pause after every mutating call to stay under
//! the shared rate limit. Every call goes through the retry policy; a
//! concurrent-modification signal abandons the operation (or the facet
//! whose listing hit it) for this pass and relies on the other run.
//!
//! Nothing here is reversible: a failure partway leaves the permission
//! set partially converged, and a subsequent invocation finishes the job
//! because every facet operation is idempotent.

use std::collections::BTreeMap;
use std::future::Future;
use tracing::{debug, info};

use permsync_store::types::{CreatePermissionSet, PermissionSetId, UpdatePermissionSet};
use permsync_store::{IdentityStore, RetryPolicy, StoreResult};

use crate::config::EngineConfig;
use crate::desired::DesiredPermissionSet;
use crate::diff::{
    attributes_changed, diff_customer_policies, diff_inline_policy, diff_managed_policies,
    diff_tags, InlinePolicyChange,
};
use crate::error::EngineResult;
use crate::reader::RemotePermissionSet;

/// Converges one definition at a time against the remote service.
pub struct ApplyEngine<'a> {
    store: &'a dyn IdentityStore,
    retry: &'a RetryPolicy,
    config: &'a EngineConfig,
}

impl<'a> ApplyEngine<'a> {
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

    /// Converge `desired` to no-drift state.
    ///
    /// Creates the permission set first when the name has no remote
    /// counterpart, threading the fresh id into the facet calls. Returns
    /// the id, or `None` when a concurrent run owns the creation and this
    /// definition is skipped for the pass.
    pub async fn converge(
        &self,
        desired: &DesiredPermissionSet,
        remote: &mut BTreeMap<String, RemotePermissionSet>,
    ) -> EngineResult<Option<PermissionSetId>> {
        if !remote.contains_key(&desired.name) {
            info!(name = %desired.name, "permission set missing remotely, creating");
            let request = CreatePermissionSet {
                name: desired.name.clone(),
                description: desired.description.clone(),
                session_duration: desired
                    .effective_session_duration(&self.config.default_session_duration)
                    .to_string(),
                tags: desired.tags.clone(),
            };
            let Some(created) = self
                .mutate("create_permission_set", || {
                    let request = request.clone();
                    async move { self.store.create_permission_set(&request).await }
                })
                .await?
            else {
                return Ok(None);
            };
            remote.insert(
                created.name.clone(),
                RemotePermissionSet {
                    id: created.id,
                    description: created.description,
                    session_duration: request.session_duration,
                },
            );
        } else {
            debug!(name = %desired.name, "permission set exists remotely, checking facets");
        }

        // The entry is guaranteed present now; clone the id so the map
        // stays free for the attribute update below.
        let id = remote[&desired.name].id.clone();

        self.sync_managed_policies(desired, &id).await?;
        self.sync_customer_policies(desired, &id).await?;
        self.sync_inline_policy(desired, &id).await?;
        self.sync_attributes(desired, &id, remote).await?;
        self.sync_tags(desired, &id).await?;

        Ok(Some(id))
    }

    async fn sync_managed_policies(
        &self,
        desired: &DesiredPermissionSet,
        id: &PermissionSetId,
    ) -> EngineResult<()> {
        let Some(attached) = self
            .read("list_managed_policies", || async move {
                self.store.list_managed_policies(id).await
            })
            .await?
        else {
            return Ok(());
        };

        let (attach, detach) = diff_managed_policies(&desired.managed_policies, &attached);
        for policy in &attach {
            if self
                .mutate("attach_managed_policy", || async move {
                    self.store.attach_managed_policy(id, &policy.arn).await
                })
                .await?
                .is_some()
            {
                info!(name = %desired.name, policy = %policy.name, "managed policy attached");
            }
        }
        for policy in &detach {
            if self
                .mutate("detach_managed_policy", || async move {
                    self.store.detach_managed_policy(id, &policy.arn).await
                })
                .await?
                .is_some()
            {
                info!(name = %desired.name, policy = %policy.name, "managed policy detached");
            }
        }
        Ok(())
    }

    async fn sync_customer_policies(
        &self,
        desired: &DesiredPermissionSet,
        id: &PermissionSetId,
    ) -> EngineResult<()> {
        let Some(attached) = self
            .read("list_customer_policies", || async move {
                self.store.list_customer_policies(id).await
            })
            .await?
        else {
            return Ok(());
        };

        let (attach, detach) = diff_customer_policies(&desired.customer_policies, &attached);
        for policy in &attach {
            if self
                .mutate("attach_customer_policy", || async move {
                    self.store.attach_customer_policy(id, policy).await
                })
                .await?
                .is_some()
            {
                info!(name = %desired.name, policy = %policy.name, "customer managed policy attached");
            }
        }
        for policy in &detach {
            if self
                .mutate("detach_customer_policy", || async move {
                    self.store.detach_customer_policy(id, policy).await
                })
                .await?
                .is_some()
            {
                info!(name = %desired.name, policy = %policy.name, "customer managed policy detached");
            }
        }
        Ok(())
    }

    async fn sync_inline_policy(
        &self,
        desired: &DesiredPermissionSet,
        id: &PermissionSetId,
    ) -> EngineResult<()> {
        let Some(existing) = self
            .read("get_inline_policy", || async move {
                self.store.get_inline_policy(id).await
            })
            .await?
        else {
            return Ok(());
        };

        match diff_inline_policy(desired.inline_policy(), existing.as_ref()) {
            InlinePolicyChange::Unchanged => {}
            InlinePolicyChange::Replace(document) => {
                if self
                    .mutate("put_inline_policy", || {
                        let document = document.clone();
                        async move { self.store.put_inline_policy(id, &document).await }
                    })
                    .await?
                    .is_some()
                {
                    info!(name = %desired.name, "inline policy replaced");
                }
            }
            InlinePolicyChange::Delete => {
                if self
                    .mutate("delete_inline_policy", || async move {
                        self.store.delete_inline_policy(id).await
                    })
                    .await?
                    .is_some()
                {
                    info!(name = %desired.name, "inline policy removed");
                }
            }
        }
        Ok(())
    }

    async fn sync_attributes(
        &self,
        desired: &DesiredPermissionSet,
        id: &PermissionSetId,
        remote: &mut BTreeMap<String, RemotePermissionSet>,
    ) -> EngineResult<()> {
        let record = &remote[&desired.name];
        let session_duration = desired
            .effective_session_duration(&self.config.default_session_duration)
            .to_string();
        if !attributes_changed(
            &desired.description,
            &session_duration,
            &record.description,
            &record.session_duration,
        ) {
            return Ok(());
        }

        let update = UpdatePermissionSet {
            description: desired.description.clone(),
            session_duration: session_duration.clone(),
        };
        if self
            .mutate("update_permission_set", || {
                let update = update.clone();
                async move { self.store.update_permission_set(id, &update).await }
            })
            .await?
            .is_some()
        {
            info!(name = %desired.name, "description/session duration updated");
            if let Some(record) = remote.get_mut(&desired.name) {
                record.description = update.description;
                record.session_duration = update.session_duration;
            }
        }
        Ok(())
    }

    async fn sync_tags(
        &self,
        desired: &DesiredPermissionSet,
        id: &PermissionSetId,
    ) -> EngineResult<()> {
        let Some(existing) = self
            .read("list_tags", || async move { self.store.list_tags(id).await })
            .await?
        else {
            return Ok(());
        };

        let (upsert, removals) = diff_tags(&desired.tags, &existing);
        if let Some(tags) = upsert {
            if self
                .mutate("upsert_tags", || {
                    let tags = tags.clone();
                    async move { self.store.upsert_tags(id, &tags).await }
                })
                .await?
                .is_some()
            {
                info!(name = %desired.name, count = tags.len(), "tags upserted");
            }
        }
        for key in &removals {
            if self
                .mutate("remove_tag", || async move {
                    self.store.remove_tag(id, key).await
                })
                .await?
                .is_some()
            {
                info!(name = %desired.name, key = %key, "tag removed");
            }
        }
        Ok(())
    }

    /// Read through the retry policy; `None` means a concurrent run owns
    /// the resource and the caller skips the facet for this pass.
    async fn read<T, F, Fut>(&self, operation: &str, f: F) -> EngineResult<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        match self.retry.execute(operation, f).await {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.is_concurrent() => {
                info!(operation, "concurrent reconciliation in progress, skipping");
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Mutate through the retry policy, pausing afterward; `None` means
    /// the operation was skipped on a concurrent-modification signal.
    async fn mutate<T, F, Fut>(&self, operation: &str, f: F) -> EngineResult<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        match self.retry.execute(operation, f).await {
            Ok(value) => {
                tokio::time::sleep(self.config.call_pause).await;
                Ok(Some(value))
            }
            Err(error) if error.is_concurrent() => {
                info!(operation, "concurrent reconciliation in progress, skipping");
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }
}
