//! In-memory fake of the identity store for integration tests.
//!
//! Tracks full permission-set state, records every mutating call in
//! order, and supports scripted failures and provisioning-status
//! sequences.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;

use permsync_engine::report::{CompletionNotifier, FailureDetails, FailureReporter};
use permsync_store::types::{
    AccountAssignment, AccountId, CreatePermissionSet, CreatedPermissionSet, CustomerManagedPolicy,
    ManagedPolicyRef, Page, PermissionSetAttributes, PermissionSetId, PrincipalType,
    ProvisioningRequestId, ProvisioningStatus, Tag, UpdatePermissionSet,
};
use permsync_store::{IdentityStore, StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
pub struct SetRecord {
    pub name: String,
    pub description: String,
    pub session_duration: String,
    pub managed: Vec<ManagedPolicyRef>,
    pub customer: Vec<CustomerManagedPolicy>,
    pub inline: Option<serde_json::Value>,
    pub tags: Vec<Tag>,
}

#[derive(Debug)]
struct Operation {
    request_id: ProvisioningRequestId,
    set_id: PermissionSetId,
    polls_until_terminal: u32,
    terminal: ProvisioningStatus,
    observed_terminal: bool,
}

#[derive(Debug, Default)]
struct State {
    sets: BTreeMap<String, SetRecord>,
    next_id: u64,
    next_request: u64,
    mutations: Vec<String>,
    /// account → permission-set ids not on the latest version there.
    stale: HashMap<String, HashSet<String>>,
    /// permission-set id → accounts it is provisioned to.
    provisioned: HashMap<String, Vec<AccountId>>,
    /// (permission-set id, account) → assignments.
    assignments: HashMap<(String, String), Vec<AccountAssignment>>,
    operations: Vec<Operation>,
    /// Polls a newly created operation spends in progress.
    polls_until_terminal: u32,
    /// Errors to return before the real behavior, keyed by operation.
    queued_errors: HashMap<&'static str, VecDeque<StoreError>>,
}

/// In-memory [`IdentityStore`] double.
#[derive(Debug, Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Seeding ───────────────────────────────────────────────────────

    pub fn seed_set(&self, name: &str, description: &str, session_duration: &str) -> PermissionSetId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("ps-{:04}", state.next_id);
        state.sets.insert(
            id.clone(),
            SetRecord {
                name: name.to_string(),
                description: description.to_string(),
                session_duration: session_duration.to_string(),
                ..SetRecord::default()
            },
        );
        PermissionSetId::new(id)
    }

    pub fn set_managed(&self, id: &PermissionSetId, policies: Vec<ManagedPolicyRef>) {
        self.with_set(id, |set| set.managed = policies);
    }

    pub fn set_customer(&self, id: &PermissionSetId, policies: Vec<CustomerManagedPolicy>) {
        self.with_set(id, |set| set.customer = policies);
    }

    pub fn set_inline(&self, id: &PermissionSetId, document: Option<serde_json::Value>) {
        self.with_set(id, |set| set.inline = document);
    }

    pub fn set_tags(&self, id: &PermissionSetId, tags: Vec<Tag>) {
        self.with_set(id, |set| set.tags = tags);
    }

    pub fn mark_provisioned(&self, id: &PermissionSetId, accounts: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.provisioned.insert(
            id.as_str().to_string(),
            accounts.iter().map(|a| AccountId::new(*a)).collect(),
        );
    }

    pub fn mark_stale(&self, account: &str, id: &PermissionSetId) {
        let mut state = self.state.lock().unwrap();
        state
            .stale
            .entry(account.to_string())
            .or_default()
            .insert(id.as_str().to_string());
    }

    pub fn add_assignment(&self, id: &PermissionSetId, account: &str, principal_id: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .assignments
            .entry((id.as_str().to_string(), account.to_string()))
            .or_default()
            .push(AccountAssignment {
                account_id: AccountId::new(account),
                principal_type: PrincipalType::Group,
                principal_id: principal_id.to_string(),
            });
    }

    /// How many polls a provisioning operation stays in progress.
    pub fn set_polls_until_terminal(&self, polls: u32) {
        self.state.lock().unwrap().polls_until_terminal = polls;
    }

    pub fn queue_error(&self, operation: &'static str, error: StoreError) {
        self.state
            .lock()
            .unwrap()
            .queued_errors
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    // ── Inspection ────────────────────────────────────────────────────

    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().unwrap().mutations.len()
    }

    pub fn remote_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.sets.values().map(|s| s.name.clone()).collect()
    }

    pub fn record_for(&self, id: &PermissionSetId) -> Option<SetRecord> {
        self.state.lock().unwrap().sets.get(id.as_str()).cloned()
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn with_set(&self, id: &PermissionSetId, f: impl FnOnce(&mut SetRecord)) {
        let mut state = self.state.lock().unwrap();
        let set = state
            .sets
            .get_mut(id.as_str())
            .unwrap_or_else(|| panic!("unknown set {id}"));
        f(set);
    }

    fn take_queued(&self, operation: &'static str) -> Option<StoreError> {
        self.state
            .lock()
            .unwrap()
            .queued_errors
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
    }

    fn log(&self, entry: String) {
        self.state.lock().unwrap().mutations.push(entry);
    }
}

#[async_trait]
impl IdentityStore for FakeStore {
    async fn list_permission_sets(
        &self,
        _page_token: Option<&str>,
    ) -> StoreResult<Page<PermissionSetId>> {
        if let Some(e) = self.take_queued("list_permission_sets") {
            return Err(e);
        }
        let state = self.state.lock().unwrap();
        Ok(Page::complete(
            state.sets.keys().map(PermissionSetId::new).collect(),
        ))
    }

    async fn describe_permission_set(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<PermissionSetAttributes> {
        if let Some(e) = self.take_queued("describe_permission_set") {
            return Err(e);
        }
        let state = self.state.lock().unwrap();
        let set = state
            .sets
            .get(id.as_str())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(PermissionSetAttributes {
            name: set.name.clone(),
            description: set.description.clone(),
            session_duration: set.session_duration.clone(),
        })
    }

    async fn create_permission_set(
        &self,
        request: &CreatePermissionSet,
    ) -> StoreResult<CreatedPermissionSet> {
        if let Some(e) = self.take_queued("create_permission_set") {
            return Err(e);
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("ps-{:04}", state.next_id);
        state.sets.insert(
            id.clone(),
            SetRecord {
                name: request.name.clone(),
                description: request.description.clone(),
                session_duration: request.session_duration.clone(),
                tags: request.tags.clone(),
                ..SetRecord::default()
            },
        );
        state.mutations.push(format!("create:{}", request.name));
        Ok(CreatedPermissionSet {
            id: PermissionSetId::new(id),
            name: request.name.clone(),
            description: request.description.clone(),
        })
    }

    async fn update_permission_set(
        &self,
        id: &PermissionSetId,
        update: &UpdatePermissionSet,
    ) -> StoreResult<()> {
        if let Some(e) = self.take_queued("update_permission_set") {
            return Err(e);
        }
        self.with_set(id, |set| {
            set.description = update.description.clone();
            set.session_duration = update.session_duration.clone();
        });
        self.log(format!("update:{id}"));
        Ok(())
    }

    async fn delete_permission_set(&self, id: &PermissionSetId) -> StoreResult<()> {
        if let Some(e) = self.take_queued("delete_permission_set") {
            return Err(e);
        }
        let mut state = self.state.lock().unwrap();
        let remaining: usize = state
            .assignments
            .iter()
            .filter(|((ps, _), v)| ps == id.as_str() && !v.is_empty())
            .count();
        if remaining > 0 {
            return Err(StoreError::Service {
                status: 400,
                detail: format!("{remaining} account assignment(s) still exist"),
            });
        }
        if state.sets.remove(id.as_str()).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        state.mutations.push(format!("delete_set:{id}"));
        Ok(())
    }

    async fn list_managed_policies(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Vec<ManagedPolicyRef>> {
        if let Some(e) = self.take_queued("list_managed_policies") {
            return Err(e);
        }
        Ok(self.record_for(id).map(|s| s.managed).unwrap_or_default())
    }

    async fn attach_managed_policy(&self, id: &PermissionSetId, arn: &str) -> StoreResult<()> {
        if let Some(e) = self.take_queued("attach_managed_policy") {
            return Err(e);
        }
        let arn_owned = arn.to_string();
        self.with_set(id, |set| {
            if !set.managed.iter().any(|p| p.arn == arn_owned) {
                set.managed.push(ManagedPolicyRef {
                    name: arn_owned.rsplit(':').next().unwrap_or(&arn_owned).to_string(),
                    arn: arn_owned.clone(),
                });
            }
        });
        self.log(format!("attach_managed:{id}:{arn}"));
        Ok(())
    }

    async fn detach_managed_policy(&self, id: &PermissionSetId, arn: &str) -> StoreResult<()> {
        if let Some(e) = self.take_queued("detach_managed_policy") {
            return Err(e);
        }
        let arn_owned = arn.to_string();
        self.with_set(id, |set| set.managed.retain(|p| p.arn != arn_owned));
        self.log(format!("detach_managed:{id}:{arn}"));
        Ok(())
    }

    async fn list_customer_policies(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Vec<CustomerManagedPolicy>> {
        if let Some(e) = self.take_queued("list_customer_policies") {
            return Err(e);
        }
        Ok(self.record_for(id).map(|s| s.customer).unwrap_or_default())
    }

    async fn attach_customer_policy(
        &self,
        id: &PermissionSetId,
        policy: &CustomerManagedPolicy,
    ) -> StoreResult<()> {
        if let Some(e) = self.take_queued("attach_customer_policy") {
            return Err(e);
        }
        let policy = policy.clone();
        let entry = format!("attach_customer:{id}:{}", policy.name);
        self.with_set(id, move |set| {
            if !set.customer.iter().any(|p| p.name == policy.name) {
                set.customer.push(policy);
            }
        });
        self.log(entry);
        Ok(())
    }

    async fn detach_customer_policy(
        &self,
        id: &PermissionSetId,
        policy: &CustomerManagedPolicy,
    ) -> StoreResult<()> {
        if let Some(e) = self.take_queued("detach_customer_policy") {
            return Err(e);
        }
        let name = policy.name.clone();
        self.with_set(id, |set| set.customer.retain(|p| p.name != name));
        self.log(format!("detach_customer:{id}:{}", policy.name));
        Ok(())
    }

    async fn get_inline_policy(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Option<serde_json::Value>> {
        if let Some(e) = self.take_queued("get_inline_policy") {
            return Err(e);
        }
        Ok(self.record_for(id).and_then(|s| s.inline))
    }

    async fn put_inline_policy(
        &self,
        id: &PermissionSetId,
        document: &serde_json::Value,
    ) -> StoreResult<()> {
        if let Some(e) = self.take_queued("put_inline_policy") {
            return Err(e);
        }
        let document = document.clone();
        self.with_set(id, |set| set.inline = Some(document));
        self.log(format!("put_inline:{id}"));
        Ok(())
    }

    async fn delete_inline_policy(&self, id: &PermissionSetId) -> StoreResult<()> {
        if let Some(e) = self.take_queued("delete_inline_policy") {
            return Err(e);
        }
        self.with_set(id, |set| set.inline = None);
        self.log(format!("delete_inline:{id}"));
        Ok(())
    }

    async fn list_tags(&self, id: &PermissionSetId) -> StoreResult<Vec<Tag>> {
        if let Some(e) = self.take_queued("list_tags") {
            return Err(e);
        }
        Ok(self.record_for(id).map(|s| s.tags).unwrap_or_default())
    }

    async fn upsert_tags(&self, id: &PermissionSetId, tags: &[Tag]) -> StoreResult<()> {
        if let Some(e) = self.take_queued("upsert_tags") {
            return Err(e);
        }
        let tags = tags.to_vec();
        self.with_set(id, |set| {
            for tag in tags {
                match set.tags.iter_mut().find(|t| t.key == tag.key) {
                    Some(existing) => existing.value = tag.value,
                    None => set.tags.push(tag),
                }
            }
        });
        self.log(format!("upsert_tags:{id}"));
        Ok(())
    }

    async fn remove_tag(&self, id: &PermissionSetId, key: &str) -> StoreResult<()> {
        if let Some(e) = self.take_queued("remove_tag") {
            return Err(e);
        }
        let key_owned = key.to_string();
        self.with_set(id, |set| set.tags.retain(|t| t.key != key_owned));
        self.log(format!("remove_tag:{id}:{key}"));
        Ok(())
    }

    async fn list_provisioned_accounts(
        &self,
        id: &PermissionSetId,
        _page_token: Option<&str>,
    ) -> StoreResult<Page<AccountId>> {
        if let Some(e) = self.take_queued("list_provisioned_accounts") {
            return Err(e);
        }
        let state = self.state.lock().unwrap();
        Ok(Page::complete(
            state
                .provisioned
                .get(id.as_str())
                .cloned()
                .unwrap_or_default(),
        ))
    }

    async fn list_stale_permission_sets(
        &self,
        account: &AccountId,
    ) -> StoreResult<Vec<PermissionSetId>> {
        if let Some(e) = self.take_queued("list_stale_permission_sets") {
            return Err(e);
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .stale
            .get(account.as_str())
            .map(|ids| ids.iter().map(PermissionSetId::new).collect())
            .unwrap_or_default())
    }

    async fn list_account_assignments(
        &self,
        id: &PermissionSetId,
        account: &AccountId,
        _page_token: Option<&str>,
    ) -> StoreResult<Page<AccountAssignment>> {
        if let Some(e) = self.take_queued("list_account_assignments") {
            return Err(e);
        }
        let state = self.state.lock().unwrap();
        Ok(Page::complete(
            state
                .assignments
                .get(&(id.as_str().to_string(), account.as_str().to_string()))
                .cloned()
                .unwrap_or_default(),
        ))
    }

    async fn delete_account_assignment(
        &self,
        id: &PermissionSetId,
        assignment: &AccountAssignment,
    ) -> StoreResult<()> {
        if let Some(e) = self.take_queued("delete_account_assignment") {
            return Err(e);
        }
        let mut state = self.state.lock().unwrap();
        let key = (
            id.as_str().to_string(),
            assignment.account_id.as_str().to_string(),
        );
        if let Some(list) = state.assignments.get_mut(&key) {
            list.retain(|a| a.principal_id != assignment.principal_id);
        }
        state.mutations.push(format!(
            "delete_assignment:{id}:{}:{}",
            assignment.account_id, assignment.principal_id
        ));
        Ok(())
    }

    async fn provision_all_accounts(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<ProvisioningRequestId> {
        if let Some(e) = self.take_queued("provision_all_accounts") {
            return Err(e);
        }
        let mut state = self.state.lock().unwrap();
        state.next_request += 1;
        let request_id = ProvisioningRequestId::new(format!("req-{:04}", state.next_request));
        let polls = state.polls_until_terminal;
        state.operations.push(Operation {
            request_id: request_id.clone(),
            set_id: id.clone(),
            polls_until_terminal: polls,
            terminal: ProvisioningStatus::Succeeded,
            observed_terminal: false,
        });
        // Drift is resolved once the service finishes provisioning.
        let set_key = id.as_str().to_string();
        for stale in state.stale.values_mut() {
            stale.remove(&set_key);
        }
        state.mutations.push(format!("provision:{id}"));
        Ok(request_id)
    }

    async fn list_in_progress_operations(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Vec<ProvisioningRequestId>> {
        if let Some(e) = self.take_queued("list_in_progress_operations") {
            return Err(e);
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .operations
            .iter()
            .filter(|op| op.set_id == *id && !op.observed_terminal)
            .map(|op| op.request_id.clone())
            .collect())
    }

    async fn describe_provisioning_operation(
        &self,
        request_id: &ProvisioningRequestId,
    ) -> StoreResult<ProvisioningStatus> {
        if let Some(e) = self.take_queued("describe_provisioning_operation") {
            return Err(e);
        }
        let mut state = self.state.lock().unwrap();
        let op = state
            .operations
            .iter_mut()
            .find(|op| op.request_id == *request_id)
            .ok_or_else(|| StoreError::NotFound(request_id.to_string()))?;
        if op.polls_until_terminal > 0 {
            op.polls_until_terminal -= 1;
            Ok(ProvisioningStatus::InProgress)
        } else {
            op.observed_terminal = true;
            Ok(op.terminal)
        }
    }
}

/// Failure reporter that records what it was told.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub failures: AsyncMutex<Vec<(String, String)>>,
}

#[async_trait]
impl FailureReporter for RecordingReporter {
    async fn report_failure(&self, job_id: &str, details: &FailureDetails) {
        self.failures
            .lock()
            .await
            .push((job_id.to_string(), details.message.clone()));
    }
}

/// Completion notifier that records published job ids.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub published: AsyncMutex<Vec<String>>,
}

#[async_trait]
impl CompletionNotifier for RecordingNotifier {
    async fn publish(&self, job_id: &str) {
        self.published.lock().await.push(job_id.to_string());
    }
}

/// Write one desired-state definition file into `dir`.
pub fn write_definition(dir: &Path, file_name: &str, record: &serde_json::Value) {
    std::fs::write(dir.join(file_name), record.to_string()).unwrap();
}
