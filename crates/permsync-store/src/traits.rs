//! The remote identity-store surface as an async trait.
//!
//! The reconciliation engine only ever talks to this trait; the REST
//! implementation lives in [`crate::http`] and tests substitute an
//! in-memory fake.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{
    AccountAssignment, AccountId, CreatePermissionSet, CreatedPermissionSet, CustomerManagedPolicy,
    ManagedPolicyRef, Page, PermissionSetAttributes, PermissionSetId, ProvisioningRequestId,
    ProvisioningStatus, Tag, UpdatePermissionSet,
};

/// Operations the reconciler needs from the identity-provisioning service.
///
/// All mutating operations are idempotent at the facet level: applying a
/// desired facet that is already in place must not change remote state.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    // ── Permission-set lifecycle ──────────────────────────────────────

    /// List one page of permission-set ids defined in the instance.
    async fn list_permission_sets(
        &self,
        page_token: Option<&str>,
    ) -> StoreResult<Page<PermissionSetId>>;

    /// Resolve name, description, and session duration for one id.
    async fn describe_permission_set(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<PermissionSetAttributes>;

    /// Create a permission set; the service assigns its id.
    async fn create_permission_set(
        &self,
        request: &CreatePermissionSet,
    ) -> StoreResult<CreatedPermissionSet>;

    /// Replace description and session duration in one call.
    async fn update_permission_set(
        &self,
        id: &PermissionSetId,
        update: &UpdatePermissionSet,
    ) -> StoreResult<()>;

    /// Delete a permission set. Fails while account assignments remain.
    async fn delete_permission_set(&self, id: &PermissionSetId) -> StoreResult<()>;

    // ── Managed-policy facet ──────────────────────────────────────────

    async fn list_managed_policies(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Vec<ManagedPolicyRef>>;

    async fn attach_managed_policy(&self, id: &PermissionSetId, arn: &str) -> StoreResult<()>;

    async fn detach_managed_policy(&self, id: &PermissionSetId, arn: &str) -> StoreResult<()>;

    // ── Customer-managed-policy facet ─────────────────────────────────

    async fn list_customer_policies(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Vec<CustomerManagedPolicy>>;

    async fn attach_customer_policy(
        &self,
        id: &PermissionSetId,
        policy: &CustomerManagedPolicy,
    ) -> StoreResult<()>;

    /// Detach by name + path; the service needs both to identify the
    /// reference.
    async fn detach_customer_policy(
        &self,
        id: &PermissionSetId,
        policy: &CustomerManagedPolicy,
    ) -> StoreResult<()>;

    // ── Inline-policy facet ───────────────────────────────────────────

    /// The embedded policy document, if one exists.
    async fn get_inline_policy(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Option<serde_json::Value>>;

    /// Replace the embedded policy document wholesale.
    async fn put_inline_policy(
        &self,
        id: &PermissionSetId,
        document: &serde_json::Value,
    ) -> StoreResult<()>;

    async fn delete_inline_policy(&self, id: &PermissionSetId) -> StoreResult<()>;

    // ── Tag facet ─────────────────────────────────────────────────────

    async fn list_tags(&self, id: &PermissionSetId) -> StoreResult<Vec<Tag>>;

    /// Batch upsert: every tag in `tags` is created or overwritten.
    async fn upsert_tags(&self, id: &PermissionSetId, tags: &[Tag]) -> StoreResult<()>;

    /// Remove a single tag by key.
    async fn remove_tag(&self, id: &PermissionSetId, key: &str) -> StoreResult<()>;

    // ── Accounts and assignments ──────────────────────────────────────

    /// One page of accounts the permission set is provisioned to.
    async fn list_provisioned_accounts(
        &self,
        id: &PermissionSetId,
        page_token: Option<&str>,
    ) -> StoreResult<Page<AccountId>>;

    /// Permission sets whose latest version is not provisioned to
    /// `account`.
    async fn list_stale_permission_sets(
        &self,
        account: &AccountId,
    ) -> StoreResult<Vec<PermissionSetId>>;

    /// One page of assignments binding `id` within `account`.
    async fn list_account_assignments(
        &self,
        id: &PermissionSetId,
        account: &AccountId,
        page_token: Option<&str>,
    ) -> StoreResult<Page<AccountAssignment>>;

    /// Remove one assignment; deprovisioning continues asynchronously on
    /// the service side.
    async fn delete_account_assignment(
        &self,
        id: &PermissionSetId,
        assignment: &AccountAssignment,
    ) -> StoreResult<()>;

    // ── Provisioning ──────────────────────────────────────────────────

    /// Re-provision the permission set to every account it is currently
    /// provisioned to.
    async fn provision_all_accounts(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<ProvisioningRequestId>;

    /// Request ids of provisioning operations for `id` still in progress.
    async fn list_in_progress_operations(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Vec<ProvisioningRequestId>>;

    /// Current status of one provisioning operation.
    async fn describe_provisioning_operation(
        &self,
        request_id: &ProvisioningRequestId,
    ) -> StoreResult<ProvisioningStatus>;
}
