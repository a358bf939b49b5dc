//! Core catalog entity model: resources, visibility, typed attribute values.

use crate::domain::error::CatalogError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Upper bound on a resource name.
pub const MAX_NAME_LEN: usize = 256;
/// Upper bound on a single tag.
pub const MAX_TAG_LEN: usize = 40;
/// Upper bound on an attribute key.
pub const MAX_ATTRIBUTE_KEY_LEN: usize = 64;

/// The entity types managed by the catalog.
#[derive(Serialize, Deserialize, Debug, ToSchema, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Project,
    Dataset,
    Experiment,
    ExperimentRun,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::Dataset => "dataset",
            ResourceKind::Experiment => "experiment",
            ResourceKind::ExperimentRun => "experiment_run",
        }
    }

    /// Parses the canonical stored form (the `as_str` values).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project" => Some(ResourceKind::Project),
            "dataset" => Some(ResourceKind::Dataset),
            "experiment" => Some(ResourceKind::Experiment),
            "experiment_run" => Some(ResourceKind::ExperimentRun),
            _ => None,
        }
    }

    /// Parses the route segment used by the HTTP surface (e.g. `projects`).
    pub fn from_route(segment: &str) -> Option<Self> {
        match segment {
            "projects" => Some(ResourceKind::Project),
            "datasets" => Some(ResourceKind::Dataset),
            "experiments" => Some(ResourceKind::Experiment),
            "experiment-runs" => Some(ResourceKind::ExperimentRun),
            other => Self::parse(other),
        }
    }
}

/// Listing visibility of a resource within its workspace.
#[derive(Serialize, Deserialize, Debug, ToSchema, Copy, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Public,
    Organization,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
            Visibility::Organization => "organization",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "private" => Some(Visibility::Private),
            "public" => Some(Visibility::Public),
            "organization" => Some(Visibility::Organization),
            _ => None,
        }
    }
}

/// A typed attribute value. The discriminant travels on the wire and in the
/// store, so a numeric filter can never be applied to a text attribute by
/// accident.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "value_type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Number(f64),
    String(String),
    Blob(JsonValue),
}

/// One attribute entry as exchanged with clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: String,
    #[serde(flatten)]
    pub value: AttributeValue,
}

/// A catalog entity (project, dataset, experiment, run).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: String,
    pub kind: ResourceKind,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub readme: String,
    /// Ordered, unique, case-sensitive.
    pub tags: Vec<String>,
    /// Unique keys; values are tagged variants.
    pub attributes: BTreeMap<String, AttributeValue>,
    pub visibility: Visibility,
    pub workspace: String,
    /// Ownership back-reference (weak): relation only, never an in-memory graph.
    pub parent_id: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub deleted: bool,
}

/// Client-supplied fields for an insert; the service fills id, owner and
/// timestamps.
#[derive(Deserialize, Debug, Clone)]
pub struct NewResource {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub readme: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<KeyValue>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Explicit target workspace; defaults to the caller's personal one.
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// One page of query results plus the total count under the same
/// predicate and scope.
#[derive(Serialize, Debug)]
pub struct ResourcePage {
    pub items: Vec<Resource>,
    pub total_records: u64,
}

fn valid_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

/// Tag constraint: 1..=40 chars from `[A-Za-z0-9_.-]`.
pub fn validate_tag(tag: &str) -> Result<(), CatalogError> {
    if tag.len() > MAX_TAG_LEN {
        return Err(CatalogError::InvalidArgument(format!(
            "tag '{}' exceeds {} characters",
            tag, MAX_TAG_LEN
        )));
    }
    if !valid_token(tag) {
        return Err(CatalogError::InvalidArgument(format!(
            "tag '{}' is empty or contains characters outside [A-Za-z0-9_.-]",
            tag
        )));
    }
    Ok(())
}

/// Attribute-key constraint: 1..=64 chars from `[A-Za-z0-9_.-]`.
pub fn validate_attribute_key(key: &str) -> Result<(), CatalogError> {
    if key.len() > MAX_ATTRIBUTE_KEY_LEN {
        return Err(CatalogError::InvalidArgument(format!(
            "attribute key '{}' exceeds {} characters",
            key, MAX_ATTRIBUTE_KEY_LEN
        )));
    }
    if !valid_token(key) {
        return Err(CatalogError::InvalidArgument(format!(
            "attribute key '{}' is empty or contains characters outside [A-Za-z0-9_.-]",
            key
        )));
    }
    Ok(())
}

/// Resource-name constraint: non-empty after trimming, bounded length.
pub fn validate_name(name: &str) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::InvalidArgument(
            "resource name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(CatalogError::InvalidArgument(format!(
            "resource name exceeds {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

/// Attribute values must be finite numbers; NaN/inf never reach the store.
pub fn validate_attribute_value(value: &AttributeValue) -> Result<(), CatalogError> {
    if let AttributeValue::Number(n) = value {
        if !n.is_finite() {
            return Err(CatalogError::InvalidArgument(
                "attribute value must be a finite number".to_string(),
            ));
        }
    }
    Ok(())
}

/// Unions `incoming` into `existing` preserving first-seen order.
/// Duplicates are no-ops. Returns the merged sequence and whether it changed.
pub fn merge_tags(existing: &[String], incoming: &[String]) -> (Vec<String>, bool) {
    let mut merged: Vec<String> = existing.to_vec();
    let mut changed = false;
    for tag in incoming {
        if !merged.iter().any(|t| t == tag) {
            merged.push(tag.clone());
            changed = true;
        }
    }
    (merged, changed)
}

/// Removes the listed tags (absent ones are no-ops), or everything when
/// `delete_all` is set. `delete_all` wins over a non-empty explicit list.
pub fn remove_tags(existing: &[String], to_remove: &[String], delete_all: bool) -> (Vec<String>, bool) {
    if delete_all {
        return (Vec::new(), !existing.is_empty());
    }
    let remaining: Vec<String> = existing
        .iter()
        .filter(|t| !to_remove.iter().any(|r| r == *t))
        .cloned()
        .collect();
    let changed = remaining.len() != existing.len();
    (remaining, changed)
}
