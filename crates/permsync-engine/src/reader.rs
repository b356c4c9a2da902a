//! Remote state reader.
//!
//! Snapshots every permission set defined in the instance: one paginated
//! listing plus one describe call per entry. Every page fetch and every
//! describe goes through the retry policy; if retries exhaust, the whole
//! listing fails rather than returning partial results.

use std::collections::BTreeMap;
use tracing::{debug, info};

use permsync_store::{IdentityStore, RetryPolicy};

use crate::error::EngineResult;
use permsync_store::types::PermissionSetId;

/// A permission set observed on the remote side.
///
/// `id` is the join key to desired records from here on; facet state is
/// fetched lazily by the apply engine.
#[derive(Debug, Clone)]
pub struct RemotePermissionSet {
    pub id: PermissionSetId,
    pub description: String,
    pub session_duration: String,
}

/// Fetch the name → remote-record mapping for the whole instance.
pub async fn snapshot_remote_state(
    store: &dyn IdentityStore,
    retry: &RetryPolicy,
) -> EngineResult<BTreeMap<String, RemotePermissionSet>> {
    let mut ids: Vec<PermissionSetId> = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let page = retry
            .execute("list_permission_sets", || {
                let token = page_token.clone();
                async move { store.list_permission_sets(token.as_deref()).await }
            })
            .await?;
        ids.extend(page.items);
        match page.next_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }
    debug!(count = ids.len(), "listed remote permission sets");

    let mut by_name = BTreeMap::new();
    for id in ids {
        let attributes = retry
            .execute("describe_permission_set", || {
                let id = id.clone();
                async move { store.describe_permission_set(&id).await }
            })
            .await?;
        by_name.insert(
            attributes.name,
            RemotePermissionSet {
                id: id.clone(),
                description: attributes.description,
                session_duration: attributes.session_duration,
            },
        );
    }

    info!(count = by_name.len(), "snapshotted remote state");
    Ok(by_name)
}
