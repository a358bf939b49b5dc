use crate::domain::entity::{Resource, ResourceKind, Visibility};
use crate::domain::error::CatalogError;
use crate::domain::scope::AccessAction;
use crate::transport::http::types::{error_response, ApiResponse, AppState};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

/// Caller identity, resolved upstream by the authentication layer and
/// forwarded in `x-caller`. Absent or empty means anonymous.
pub fn caller_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-caller")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn parse_kind(segment: &str) -> Result<ResourceKind, (StatusCode, Json<ApiResponse>)> {
    ResourceKind::from_route(segment).ok_or_else(|| {
        error_response(&CatalogError::InvalidArgument(format!(
            "unknown resource kind '{}'",
            segment
        )))
    })
}

pub fn require_caller(
    headers: &HeaderMap,
) -> Result<String, (StatusCode, Json<ApiResponse>)> {
    caller_from_headers(headers).ok_or_else(|| {
        error_response(&CatalogError::PermissionDenied(
            "caller identity required".to_string(),
        ))
    })
}

/// Read gate for single-resource endpoints: publicly visible resources are
/// readable by anyone, everything else goes through the permission check.
pub async fn authorize_read(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<Resource, (StatusCode, Json<ApiResponse>)> {
    let resource = state
        .catalog
        .get_resource(id)
        .await
        .map_err(|e| error_response(&e))?;
    if resource.visibility == Visibility::Public {
        return Ok(resource);
    }
    let caller = caller_from_headers(headers);
    state
        .resolver
        .ensure_permitted(caller.as_deref(), AccessAction::Read, id)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(resource)
}

/// Mutation gate: the caller must hold `action` on the resource.
pub async fn authorize_mutation(
    state: &AppState,
    headers: &HeaderMap,
    action: AccessAction,
    id: &str,
) -> Result<String, (StatusCode, Json<ApiResponse>)> {
    let caller = require_caller(headers)?;
    state
        .resolver
        .ensure_permitted(Some(&caller), action, id)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(caller)
}
