//! External authorization collaborator: trait contract + HTTP client.
//!
//! The resolver depends only on [`AccessControl`], so tests substitute a
//! fake without any network. The HTTP implementation is deliberately thin;
//! timeout and fail-closed policy live in the resolver, not here.

use crate::domain::entity::ResourceKind;
use crate::domain::scope::{AccessAction, Accessible};
use crate::infra::config;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Failure talking to the authorization collaborator.
#[derive(Debug, Error)]
#[error("authorization collaborator failure: {0}")]
pub struct AccessError(pub String);

/// Contract the core requires from the authorization service.
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// The set of resource ids for which `caller` holds `action` permission.
    async fn accessible_ids(
        &self,
        caller: &str,
        action: AccessAction,
        kind: ResourceKind,
    ) -> Result<Accessible, AccessError>;

    /// Whether `caller` holds `action` permission on one resource.
    async fn check_permission(
        &self,
        caller: &str,
        action: AccessAction,
        resource_id: &str,
    ) -> Result<bool, AccessError>;
}

#[derive(Serialize)]
struct AccessibleIdsRequest<'a> {
    caller: &'a str,
    action: &'a str,
    resource_kind: &'a str,
}

#[derive(Deserialize)]
struct AccessibleIdsResponse {
    #[serde(default)]
    all: bool,
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Serialize)]
struct CheckPermissionRequest<'a> {
    caller: &'a str,
    action: &'a str,
    resource_id: &'a str,
}

#[derive(Deserialize)]
struct CheckPermissionResponse {
    allowed: bool,
}

/// HTTP JSON client for the authorization collaborator.
pub struct RemoteAccessControl {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteAccessControl {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Reads `AUTHZ_BASE_URL` from the environment.
    pub fn from_env() -> Self {
        Self::new(config::authz_base_url())
    }
}

#[async_trait]
impl AccessControl for RemoteAccessControl {
    async fn accessible_ids(
        &self,
        caller: &str,
        action: AccessAction,
        kind: ResourceKind,
    ) -> Result<Accessible, AccessError> {
        let url = format!("{}/v1/accessible-ids", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&AccessibleIdsRequest {
                caller,
                action: action.as_str(),
                resource_kind: kind.as_str(),
            })
            .send()
            .await
            .map_err(|e| AccessError(e.to_string()))?
            .error_for_status()
            .map_err(|e| AccessError(e.to_string()))?;

        let body: AccessibleIdsResponse = response
            .json()
            .await
            .map_err(|e| AccessError(format!("malformed accessible-ids response: {}", e)))?;
        if body.all {
            Ok(Accessible::All)
        } else {
            Ok(Accessible::Ids(BTreeSet::from_iter(body.ids)))
        }
    }

    async fn check_permission(
        &self,
        caller: &str,
        action: AccessAction,
        resource_id: &str,
    ) -> Result<bool, AccessError> {
        let url = format!("{}/v1/check-permission", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&CheckPermissionRequest {
                caller,
                action: action.as_str(),
                resource_id,
            })
            .send()
            .await
            .map_err(|e| AccessError(e.to_string()))?
            .error_for_status()
            .map_err(|e| AccessError(e.to_string()))?;

        let body: CheckPermissionResponse = response
            .json()
            .await
            .map_err(|e| AccessError(format!("malformed check-permission response: {}", e)))?;
        Ok(body.allowed)
    }
}
