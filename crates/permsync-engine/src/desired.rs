//! Desired-state model: one JSON record per permission set.
//!
//! Records are reconstructed from files every invocation; nothing about
//! them persists across runs. Validation is an explicit stage: a record
//! that parses but carries nonsense fails here with the offending file
//! name, before any remote call is made.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

use permsync_store::types::{CustomerManagedPolicy, ManagedPolicyRef, Tag};

use crate::error::{EngineError, EngineResult};

/// A declarative permission-set definition as read from a file.
#[derive(Debug, Clone, Deserialize)]
pub struct DesiredPermissionSet {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Tags")]
    pub tags: Vec<Tag>,
    #[serde(rename = "ManagedPolicies")]
    pub managed_policies: Vec<ManagedPolicyRef>,
    #[serde(rename = "InlinePolicies")]
    inline_policy: serde_json::Value,
    #[serde(rename = "CustomerPolicies", default)]
    pub customer_policies: Vec<CustomerManagedPolicy>,
    #[serde(rename = "Session_Duration", default)]
    pub session_duration: Option<String>,
}

impl DesiredPermissionSet {
    /// The inline policy document, with "empty" spellings normalized away.
    ///
    /// `null`, `""`, `{}`, and `[]` all mean "no inline policy".
    #[must_use]
    pub fn inline_policy(&self) -> Option<&serde_json::Value> {
        match &self.inline_policy {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::Object(m) if m.is_empty() => None,
            serde_json::Value::Array(a) if a.is_empty() => None,
            other => Some(other),
        }
    }

    /// Session duration, falling back to the process-wide default.
    ///
    /// Never inferred from existing remote state.
    #[must_use]
    pub fn effective_session_duration<'a>(&'a self, default: &'a str) -> &'a str {
        self.session_duration.as_deref().unwrap_or(default)
    }

    /// Check the record for problems parsing alone cannot catch.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name must not be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err(format!("'{}': Description must not be empty", self.name));
        }
        let mut tag_keys = HashSet::new();
        for tag in &self.tags {
            if !tag_keys.insert(tag.key.as_str()) {
                return Err(format!("'{}': duplicate tag key '{}'", self.name, tag.key));
            }
        }
        let mut policy_names = HashSet::new();
        for policy in &self.managed_policies {
            if !policy_names.insert(policy.name.as_str()) {
                return Err(format!(
                    "'{}': duplicate managed policy '{}'",
                    self.name, policy.name
                ));
            }
        }
        let mut customer_names = HashSet::new();
        for policy in &self.customer_policies {
            if !customer_names.insert(policy.name.as_str()) {
                return Err(format!(
                    "'{}': duplicate customer managed policy '{}'",
                    self.name, policy.name
                ));
            }
        }
        if let Some(duration) = &self.session_duration {
            if !is_iso8601_duration(duration) {
                return Err(format!(
                    "'{}': Session_Duration '{}' is not an ISO-8601 duration",
                    self.name, duration
                ));
            }
        }
        if !matches!(
            self.inline_policy,
            serde_json::Value::Null | serde_json::Value::Object(_)
        ) && self.inline_policy().is_some()
        {
            return Err(format!(
                "'{}': InlinePolicies must be a JSON object or empty",
                self.name
            ));
        }
        Ok(())
    }
}

/// Minimal shape check for durations like `PT1H`, `PT12H`, `PT30M`.
fn is_iso8601_duration(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("PT") else {
        return false;
    };
    !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, 'H' | 'M' | 'S'))
        && rest.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Load every `*.json` definition under `dir`, keyed by permission-set
/// name.
///
/// Any unreadable file, parse failure, validation failure, or duplicate
/// name is fatal for the run, since a half-loaded desired state would
/// delete the missing half.
pub fn load_definitions(dir: &Path) -> EngineResult<BTreeMap<String, DesiredPermissionSet>> {
    let mut definitions = BTreeMap::new();
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
        .map_err(|source| EngineError::DefinitionsUnreadable {
            path: dir.display().to_string(),
            source,
        })?;
    entries.sort_by_key(std::fs::DirEntry::path);

    for entry in entries {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let file = path.display().to_string();
        debug!(file = %file, "reading definition");
        let contents = std::fs::read_to_string(&path).map_err(|source| {
            EngineError::DefinitionsUnreadable {
                path: file.clone(),
                source,
            }
        })?;
        let definition: DesiredPermissionSet =
            serde_json::from_str(&contents).map_err(|e| EngineError::MalformedDefinition {
                file: file.clone(),
                reason: e.to_string(),
            })?;
        definition
            .validate()
            .map_err(|reason| EngineError::MalformedDefinition {
                file: file.clone(),
                reason,
            })?;
        if let Some(previous) = definitions.insert(definition.name.clone(), definition) {
            return Err(EngineError::MalformedDefinition {
                file,
                reason: format!("duplicate definition for '{}'", previous.name),
            });
        }
    }

    info!(count = definitions.len(), "loaded desired definitions");
    Ok(definitions)
}
