//! Facet diff engine.
//!
//! Pure functions, one per facet of a permission set. Each computes the
//! minimal operation set that converges remote state to desired state;
//! the apply engine executes them. There is no ordering dependency
//! between facets.

use std::collections::{HashMap, HashSet};

use permsync_store::types::{CustomerManagedPolicy, ManagedPolicyRef, Tag};

/// Managed-policy convergence: what to attach and what to detach.
///
/// Symmetric difference keyed by policy name: desired-but-not-attached are
/// attached, attached-but-not-desired are detached. `|attach| + |detach|`
/// is minimal for convergence.
pub fn diff_managed_policies(
    desired: &[ManagedPolicyRef],
    remote: &[ManagedPolicyRef],
) -> (Vec<ManagedPolicyRef>, Vec<ManagedPolicyRef>) {
    let desired_names: HashSet<&str> = desired.iter().map(|p| p.name.as_str()).collect();
    let remote_names: HashSet<&str> = remote.iter().map(|p| p.name.as_str()).collect();

    let attach = desired
        .iter()
        .filter(|p| !remote_names.contains(p.name.as_str()))
        .cloned()
        .collect();
    let detach = remote
        .iter()
        .filter(|p| !desired_names.contains(p.name.as_str()))
        .cloned()
        .collect();
    (attach, detach)
}

/// Customer-managed-policy convergence, keyed by name.
///
/// The path rides along because the detach call needs name + path to
/// identify the reference.
pub fn diff_customer_policies(
    desired: &[CustomerManagedPolicy],
    remote: &[CustomerManagedPolicy],
) -> (Vec<CustomerManagedPolicy>, Vec<CustomerManagedPolicy>) {
    let desired_names: HashSet<&str> = desired.iter().map(|p| p.name.as_str()).collect();
    let remote_names: HashSet<&str> = remote.iter().map(|p| p.name.as_str()).collect();

    let attach = desired
        .iter()
        .filter(|p| !remote_names.contains(p.name.as_str()))
        .cloned()
        .collect();
    let detach = remote
        .iter()
        .filter(|p| !desired_names.contains(p.name.as_str()))
        .cloned()
        .collect();
    (attach, detach)
}

/// Tag convergence.
///
/// Equality is by value, order-insensitive. If any desired key is missing
/// remotely or carries a different value, the full desired tag list goes
/// out as one batch upsert, never a partial patch. Remote-only keys are
/// removed individually.
pub fn diff_tags(desired: &[Tag], remote: &[Tag]) -> (Option<Vec<Tag>>, Vec<String>) {
    let remote_by_key: HashMap<&str, &str> = remote
        .iter()
        .map(|t| (t.key.as_str(), t.value.as_str()))
        .collect();
    let desired_keys: HashSet<&str> = desired.iter().map(|t| t.key.as_str()).collect();

    let needs_upsert = desired
        .iter()
        .any(|t| remote_by_key.get(t.key.as_str()) != Some(&t.value.as_str()));
    let upsert = needs_upsert.then(|| desired.to_vec());

    let removals = remote
        .iter()
        .filter(|t| !desired_keys.contains(t.key.as_str()))
        .map(|t| t.key.clone())
        .collect();
    (upsert, removals)
}

/// What to do about the inline policy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlinePolicyChange {
    /// Remote already matches desired; no call.
    Unchanged,
    /// Desired document replaces the remote one wholesale.
    Replace(serde_json::Value),
    /// Desired has no inline policy but remote does; delete it.
    Delete,
}

/// Inline-policy convergence.
///
/// A present desired document replaces whatever is remote (no
/// field-level diff) but only when the two differ as JSON values, so a
/// converged run issues no call. An absent desired document deletes any
/// existing remote one.
pub fn diff_inline_policy(
    desired: Option<&serde_json::Value>,
    remote: Option<&serde_json::Value>,
) -> InlinePolicyChange {
    match (desired, remote) {
        (Some(d), Some(r)) if d == r => InlinePolicyChange::Unchanged,
        (Some(d), _) => InlinePolicyChange::Replace(d.clone()),
        (None, Some(_)) => InlinePolicyChange::Delete,
        (None, None) => InlinePolicyChange::Unchanged,
    }
}

/// Description/session-duration convergence: exact equality, one update
/// call carrying both desired values on any mismatch.
pub fn attributes_changed(
    desired_description: &str,
    desired_session_duration: &str,
    remote_description: &str,
    remote_session_duration: &str,
) -> bool {
    desired_description != remote_description
        || desired_session_duration != remote_session_duration
}
