//! Wire types for the identity-provisioning service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque stable handle assigned to a permission set at creation.
///
/// This is the join key between desired and remote records once a set
/// exists; it is never derived from the set's name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSetId(String);

impl PermissionSetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an account the service can provision permission sets to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request id of an asynchronous provisioning operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisioningRequestId(String);

impl ProvisioningRequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProvisioningRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key/value tag on a permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A reusable policy attached by its stable identity reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedPolicyRef {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Arn")]
    pub arn: String,
}

/// A policy owned outside this system, identified by name + path.
///
/// The remote API requires both fields to identify the reference on detach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerManagedPolicy {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Path")]
    pub path: String,
}

/// Descriptive attributes of a remote permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSetAttributes {
    pub name: String,
    pub description: String,
    pub session_duration: String,
}

/// Payload for creating a permission set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionSet {
    pub name: String,
    pub description: String,
    pub session_duration: String,
    pub tags: Vec<Tag>,
}

/// A freshly created permission set, carrying the service-assigned id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPermissionSet {
    pub id: PermissionSetId,
    pub name: String,
    pub description: String,
}

/// Attribute update for an existing permission set.
///
/// Description and session duration travel together: the remote update call
/// replaces both in one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePermissionSet {
    pub description: String,
    pub session_duration: String,
}

/// Type of principal an assignment binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalType {
    User,
    Group,
}

/// A binding of a permission set to one account and principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAssignment {
    pub account_id: AccountId,
    pub principal_type: PrincipalType,
    pub principal_id: String,
}

/// Status of an asynchronous provisioning operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningStatus {
    InProgress,
    Succeeded,
    Failed,
}

impl ProvisioningStatus {
    /// Whether the operation has left the in-progress state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProvisioningStatus::InProgress)
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A single page holding everything, with no continuation.
    pub fn complete(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}
