use crate::app::{CatalogService, ScopeResolver};
use crate::domain::entity::{KeyValue, Visibility};
use crate::domain::error::CatalogError;
use crate::domain::predicate::RawClause;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub resolver: Arc<ScopeResolver>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Query request for a resource listing.
#[derive(Deserialize, Debug, ToSchema)]
pub struct FindResourcesRequest {
    /// Filter clauses; same-key clauses are OR-ed, distinct keys AND-ed.
    #[serde(default)]
    pub predicates: Vec<RawClause>,
    /// Explicit id hint; narrows the authorization scope by intersection.
    #[serde(default)]
    pub resource_ids: Vec<String>,
    /// Workspace to list in; defaults to the caller's personal workspace.
    #[serde(default)]
    pub workspace: Option<String>,
    /// Requested visibility; PUBLIC merges publicly visible resources into
    /// the scope.
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub sort_key: Option<String>,
    #[serde(default)]
    pub ascending: bool,
    /// 1-indexed; 0 means "all matching records".
    #[serde(default)]
    pub page_number: u64,
    /// Records per page; 0 means "unbounded".
    #[serde(default)]
    pub page_limit: u64,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateResourceRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub readme: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub attributes: Vec<KeyValue>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Scalar field updates; absent fields are untouched.
#[derive(Deserialize, Debug, ToSchema)]
pub struct UpdateResourceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub readme: Option<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct DeleteResourcesRequest {
    pub ids: Vec<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct AddTagsRequest {
    pub tags: Vec<String>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct DeleteTagsRequest {
    #[serde(default)]
    pub tags: Vec<String>,
    /// Clears the whole tag list; wins over a non-empty `tags` list.
    #[serde(default)]
    pub delete_all: bool,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct AddAttributesRequest {
    #[schema(value_type = Vec<Object>)]
    pub attributes: Vec<KeyValue>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UpdateAttributeRequest {
    #[schema(value_type = Object)]
    pub attribute: KeyValue,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct DeleteAttributesRequest {
    #[serde(default)]
    pub attribute_keys: Vec<String>,
    #[serde(default)]
    pub delete_all: bool,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct GetAttributesRequest {
    #[serde(default)]
    pub attribute_keys: Vec<String>,
    #[serde(default)]
    pub get_all: bool,
}

pub fn ok_response(data: JsonValue) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }),
    )
}

/// Maps the error taxonomy onto stable HTTP statuses.
pub fn error_response(err: &CatalogError) -> (StatusCode, Json<ApiResponse>) {
    let status = match err {
        CatalogError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
        CatalogError::AlreadyExists(_) => StatusCode::CONFLICT,
        CatalogError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        CatalogError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CatalogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(err.to_string()),
        }),
    )
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(format!("Invalid JSON body: {} (expected: {})", err, expected)),
        }),
    )
}
