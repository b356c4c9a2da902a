//! REST implementation of [`IdentityStore`] (reqwest-based).
//!
//! Maps the service's HTTP responses onto the error taxonomy: 429 becomes
//! [`StoreError::Throttled`] (honoring `Retry-After`), 409 becomes
//! [`StoreError::ConcurrentModification`], everything else non-2xx is
//! fatal for the enclosing operation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::IdentityStore;
use crate::types::{
    AccountAssignment, AccountId, CreatePermissionSet, CreatedPermissionSet, CustomerManagedPolicy,
    ManagedPolicyRef, Page, PermissionSetAttributes, PermissionSetId, ProvisioningRequestId,
    ProvisioningStatus, Tag, UpdatePermissionSet,
};

/// HTTP client for the identity-provisioning service.
#[derive(Debug, Clone)]
pub struct RestIdentityStore {
    base_url: String,
    instance_id: String,
    api_token: Option<String>,
    http: Client,
}

#[derive(Debug, serde::Deserialize)]
struct Envelope<T> {
    items: Vec<T>,
}

#[derive(Debug, serde::Deserialize)]
struct InlinePolicyEnvelope {
    document: Option<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionResponse {
    request_id: ProvisioningRequestId,
}

#[derive(Debug, serde::Deserialize)]
struct OperationStatusResponse {
    status: ProvisioningStatus,
}

impl RestIdentityStore {
    /// Build a client from configuration.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("permsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(config, http))
    }

    /// Build a client around a pre-built `reqwest::Client` (for tests).
    #[must_use]
    pub fn with_http_client(config: &StoreConfig, http: Client) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            instance_id: config.instance_id.clone(),
            api_token: config.api_token.clone(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/instances/{}/{}",
            self.base_url, self.instance_id, path
        )
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        page_token: Option<&str>,
    ) -> StoreResult<T> {
        let url = self.url(path);
        debug!(%url, "store GET");
        let mut builder = self.http.get(&url);
        if let Some(token) = page_token {
            builder = builder.query(&[("pageToken", token)]);
        }
        let response = self.authorize(builder).send().await?;
        Self::handle_response(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> StoreResult<T> {
        let url = self.url(path);
        debug!(%url, "store POST");
        let response = self.authorize(self.http.post(&url)).json(body).send().await?;
        Self::handle_response(response).await
    }

    async fn post_no_content<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> StoreResult<()> {
        let url = self.url(path);
        debug!(%url, "store POST");
        let response = self.authorize(self.http.post(&url)).json(body).send().await?;
        Self::expect_no_content(response).await
    }

    async fn put_no_content<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> StoreResult<()> {
        let url = self.url(path);
        debug!(%url, "store PUT");
        let response = self.authorize(self.http.put(&url)).json(body).send().await?;
        Self::expect_no_content(response).await
    }

    async fn delete_no_content(&self, path: &str) -> StoreResult<()> {
        let url = self.url(path);
        debug!(%url, "store DELETE");
        let response = self.authorize(self.http.delete(&url)).send().await?;
        Self::expect_no_content(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> StoreResult<T> {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| StoreError::Parse(format!("unexpected response body: {e}")))
        } else {
            Err(Self::error_for(response).await)
        }
    }

    async fn expect_no_content(response: reqwest::Response) -> StoreResult<()> {
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            Ok(())
        } else {
            Err(Self::error_for(response).await)
        }
    }

    async fn error_for(response: reqwest::Response) -> StoreError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(retry_after_secs = ?retry_after, "identity store throttled the call");
                StoreError::Throttled {
                    retry_after_secs: retry_after,
                }
            }
            StatusCode::CONFLICT => StoreError::ConcurrentModification(body),
            StatusCode::NOT_FOUND => StoreError::NotFound(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                StoreError::Auth(format!("{status}: {body}"))
            }
            _ => StoreError::Service {
                status: status.as_u16(),
                detail: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
            },
        }
    }
}

#[async_trait]
impl IdentityStore for RestIdentityStore {
    async fn list_permission_sets(
        &self,
        page_token: Option<&str>,
    ) -> StoreResult<Page<PermissionSetId>> {
        self.get_json("permission-sets", page_token).await
    }

    async fn describe_permission_set(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<PermissionSetAttributes> {
        self.get_json(&format!("permission-sets/{id}"), None).await
    }

    async fn create_permission_set(
        &self,
        request: &CreatePermissionSet,
    ) -> StoreResult<CreatedPermissionSet> {
        self.post_json("permission-sets", request).await
    }

    async fn update_permission_set(
        &self,
        id: &PermissionSetId,
        update: &UpdatePermissionSet,
    ) -> StoreResult<()> {
        self.put_no_content(&format!("permission-sets/{id}"), update)
            .await
    }

    async fn delete_permission_set(&self, id: &PermissionSetId) -> StoreResult<()> {
        self.delete_no_content(&format!("permission-sets/{id}")).await
    }

    async fn list_managed_policies(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Vec<ManagedPolicyRef>> {
        let envelope: Envelope<ManagedPolicyRef> = self
            .get_json(&format!("permission-sets/{id}/managed-policies"), None)
            .await?;
        Ok(envelope.items)
    }

    async fn attach_managed_policy(&self, id: &PermissionSetId, arn: &str) -> StoreResult<()> {
        self.post_no_content(
            &format!("permission-sets/{id}/managed-policies:attach"),
            &serde_json::json!({ "arn": arn }),
        )
        .await
    }

    async fn detach_managed_policy(&self, id: &PermissionSetId, arn: &str) -> StoreResult<()> {
        self.post_no_content(
            &format!("permission-sets/{id}/managed-policies:detach"),
            &serde_json::json!({ "arn": arn }),
        )
        .await
    }

    async fn list_customer_policies(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Vec<CustomerManagedPolicy>> {
        let envelope: Envelope<CustomerManagedPolicy> = self
            .get_json(
                &format!("permission-sets/{id}/customer-managed-policies"),
                None,
            )
            .await?;
        Ok(envelope.items)
    }

    async fn attach_customer_policy(
        &self,
        id: &PermissionSetId,
        policy: &CustomerManagedPolicy,
    ) -> StoreResult<()> {
        self.post_no_content(
            &format!("permission-sets/{id}/customer-managed-policies:attach"),
            policy,
        )
        .await
    }

    async fn detach_customer_policy(
        &self,
        id: &PermissionSetId,
        policy: &CustomerManagedPolicy,
    ) -> StoreResult<()> {
        self.post_no_content(
            &format!("permission-sets/{id}/customer-managed-policies:detach"),
            policy,
        )
        .await
    }

    async fn get_inline_policy(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Option<serde_json::Value>> {
        let envelope: InlinePolicyEnvelope = self
            .get_json(&format!("permission-sets/{id}/inline-policy"), None)
            .await?;
        Ok(envelope.document)
    }

    async fn put_inline_policy(
        &self,
        id: &PermissionSetId,
        document: &serde_json::Value,
    ) -> StoreResult<()> {
        self.put_no_content(
            &format!("permission-sets/{id}/inline-policy"),
            &serde_json::json!({ "document": document }),
        )
        .await
    }

    async fn delete_inline_policy(&self, id: &PermissionSetId) -> StoreResult<()> {
        self.delete_no_content(&format!("permission-sets/{id}/inline-policy"))
            .await
    }

    async fn list_tags(&self, id: &PermissionSetId) -> StoreResult<Vec<Tag>> {
        let envelope: Envelope<Tag> = self
            .get_json(&format!("permission-sets/{id}/tags"), None)
            .await?;
        Ok(envelope.items)
    }

    async fn upsert_tags(&self, id: &PermissionSetId, tags: &[Tag]) -> StoreResult<()> {
        self.post_no_content(
            &format!("permission-sets/{id}/tags"),
            &serde_json::json!({ "tags": tags }),
        )
        .await
    }

    async fn remove_tag(&self, id: &PermissionSetId, key: &str) -> StoreResult<()> {
        self.delete_no_content(&format!("permission-sets/{id}/tags/{key}"))
            .await
    }

    async fn list_provisioned_accounts(
        &self,
        id: &PermissionSetId,
        page_token: Option<&str>,
    ) -> StoreResult<Page<AccountId>> {
        self.get_json(&format!("permission-sets/{id}/accounts"), page_token)
            .await
    }

    async fn list_stale_permission_sets(
        &self,
        account: &AccountId,
    ) -> StoreResult<Vec<PermissionSetId>> {
        let envelope: Envelope<PermissionSetId> = self
            .get_json(&format!("accounts/{account}/stale-permission-sets"), None)
            .await?;
        Ok(envelope.items)
    }

    async fn list_account_assignments(
        &self,
        id: &PermissionSetId,
        account: &AccountId,
        page_token: Option<&str>,
    ) -> StoreResult<Page<AccountAssignment>> {
        self.get_json(
            &format!("permission-sets/{id}/accounts/{account}/assignments"),
            page_token,
        )
        .await
    }

    async fn delete_account_assignment(
        &self,
        id: &PermissionSetId,
        assignment: &AccountAssignment,
    ) -> StoreResult<()> {
        self.post_no_content(
            &format!(
                "permission-sets/{id}/accounts/{}/assignments:delete",
                assignment.account_id
            ),
            assignment,
        )
        .await
    }

    async fn provision_all_accounts(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<ProvisioningRequestId> {
        let response: ProvisionResponse = self
            .post_json(
                &format!("permission-sets/{id}:provision"),
                &serde_json::json!({ "targetType": "ALL_PROVISIONED_ACCOUNTS" }),
            )
            .await?;
        Ok(response.request_id)
    }

    async fn list_in_progress_operations(
        &self,
        id: &PermissionSetId,
    ) -> StoreResult<Vec<ProvisioningRequestId>> {
        let envelope: Envelope<ProvisioningRequestId> = self
            .get_json(
                &format!("permission-sets/{id}/provisioning-operations?status=IN_PROGRESS"),
                None,
            )
            .await?;
        Ok(envelope.items)
    }

    async fn describe_provisioning_operation(
        &self,
        request_id: &ProvisioningRequestId,
    ) -> StoreResult<ProvisioningStatus> {
        let response: OperationStatusResponse = self
            .get_json(&format!("provisioning-operations/{request_id}"), None)
            .await?;
        Ok(response.status)
    }
}
