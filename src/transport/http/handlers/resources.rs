use crate::domain::entity::NewResource;
use crate::domain::error::CatalogError;
use crate::domain::predicate;
use crate::domain::scope::AccessAction;
use crate::transport::http::handlers::common::{
    authorize_mutation, authorize_read, caller_from_headers, parse_kind, require_caller,
};
use crate::transport::http::types::{
    error_response, json_422, ok_response, ApiResponse, AppState, CreateResourceRequest,
    DeleteResourcesRequest, FindResourcesRequest, UpdateResourceRequest,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::collections::BTreeSet;

#[utoipa::path(
    post,
    path = "/api/v1/{kind}/find",
    params(("kind" = String, Path, description = "Resource kind (e.g. projects, datasets)")),
    request_body = FindResourcesRequest,
    responses(
        (status = 200, description = "One page of resources plus total count", body = ApiResponse),
        (status = 400, description = "Invalid predicate or request", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 503, description = "Authorization collaborator or store unavailable", body = ApiResponse)
    )
)]
pub async fn find_resources_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    request: Result<Json<FindResourcesRequest>, JsonRejection>,
) -> impl IntoResponse {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp.into_response(),
    };
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"predicates\": [...], ...}").into_response(),
    };
    let caller = caller_from_headers(&headers);

    // The predicate compiles before any store or collaborator work.
    let tree = match predicate::compile(&request.predicates) {
        Ok(t) => t,
        Err(e) => return error_response(&e).into_response(),
    };

    let workspace = match request.workspace.clone().or_else(|| caller.clone()) {
        Some(w) => w,
        None => {
            return error_response(&CatalogError::InvalidArgument(
                "workspace is required for anonymous listing".to_string(),
            ))
            .into_response();
        }
    };
    let hint = if request.resource_ids.is_empty() {
        None
    } else {
        Some(BTreeSet::from_iter(request.resource_ids.iter().cloned()))
    };

    let scope = match state
        .resolver
        .resolve(
            caller.as_deref(),
            AccessAction::Read,
            kind,
            &workspace,
            request.visibility.unwrap_or_default(),
            hint,
        )
        .await
    {
        Ok(s) => s,
        Err(e) => return error_response(&e).into_response(),
    };

    match state
        .catalog
        .find_resources(
            kind,
            &tree,
            &scope,
            request.sort_key.as_deref().unwrap_or(""),
            request.ascending,
            request.page_number,
            request.page_limit,
        )
        .await
    {
        Ok(page) => ok_response(json!({
            "resources": page.items,
            "total_records": page.total_records,
        }))
        .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/{kind}",
    params(("kind" = String, Path, description = "Resource kind")),
    request_body = CreateResourceRequest,
    responses(
        (status = 200, description = "Created resource", body = ApiResponse),
        (status = 400, description = "Invalid request", body = ApiResponse),
        (status = 403, description = "Caller identity required", body = ApiResponse)
    )
)]
pub async fn create_resource_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    request: Result<Json<CreateResourceRequest>, JsonRejection>,
) -> impl IntoResponse {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp.into_response(),
    };
    let caller = match require_caller(&headers) {
        Ok(c) => c,
        Err(resp) => return resp.into_response(),
    };
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"name\": \"...\", ...}").into_response(),
    };

    let spec = NewResource {
        kind,
        name: request.name,
        description: request.description,
        readme: request.readme,
        tags: request.tags,
        attributes: request.attributes,
        visibility: request.visibility,
        workspace: request.workspace,
        parent_id: request.parent_id,
    };
    match state.catalog.insert_resource(spec, &caller).await {
        Ok(resource) => ok_response(json!({ "resource": resource })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/resources/{id}",
    params(("id" = String, Path, description = "Resource id")),
    responses(
        (status = 200, description = "The resource", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse)
    )
)]
pub async fn get_resource_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    match authorize_read(&state, &headers, &id).await {
        Ok(resource) => ok_response(json!({ "resource": resource })).into_response(),
        Err(resp) => resp.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/update",
    params(("id" = String, Path, description = "Resource id")),
    request_body = UpdateResourceRequest,
    responses(
        (status = 200, description = "Updated resource", body = ApiResponse),
        (status = 400, description = "No fields to update", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse)
    )
)]
pub async fn update_resource_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    request: Result<Json<UpdateResourceRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"description\": \"...\", ...}").into_response(),
    };
    if request.name.is_none() && request.description.is_none() && request.readme.is_none() {
        return error_response(&CatalogError::InvalidArgument(
            "at least one of name, description, readme is required".to_string(),
        ))
        .into_response();
    }
    if let Err(resp) = authorize_mutation(&state, &headers, AccessAction::Update, &id).await {
        return resp.into_response();
    }

    let result = async {
        let mut resource = None;
        if let Some(name) = &request.name {
            resource = Some(state.catalog.update_name(&id, name).await?);
        }
        if let Some(description) = &request.description {
            resource = Some(state.catalog.update_description(&id, description).await?);
        }
        if let Some(readme) = &request.readme {
            resource = Some(state.catalog.update_readme(&id, readme).await?);
        }
        Ok::<_, CatalogError>(resource)
    }
    .await;

    match result {
        Ok(Some(resource)) => ok_response(json!({ "resource": resource })).into_response(),
        Ok(None) => error_response(&CatalogError::Internal(
            "update produced no snapshot".to_string(),
        ))
        .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/{kind}/delete",
    params(("kind" = String, Path, description = "Resource kind")),
    request_body = DeleteResourcesRequest,
    responses(
        (status = 200, description = "Ids flipped to deleted", body = ApiResponse),
        (status = 400, description = "Empty id list", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse)
    )
)]
pub async fn delete_resources_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    request: Result<Json<DeleteResourcesRequest>, JsonRejection>,
) -> impl IntoResponse {
    if let Err(resp) = parse_kind(&kind) {
        return resp.into_response();
    }
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"ids\": [...]}").into_response(),
    };
    if request.ids.is_empty() {
        return error_response(&CatalogError::InvalidArgument(
            "ids must not be empty".to_string(),
        ))
        .into_response();
    }

    // Already-deleted or unknown ids are skipped (idempotent delete); only
    // live targets go through the permission gate.
    let mut live_ids = Vec::new();
    for id in &request.ids {
        match state.catalog.get_resource(id).await {
            Ok(_) => live_ids.push(id.clone()),
            Err(CatalogError::NotFound(_)) => continue,
            Err(e) => return error_response(&e).into_response(),
        }
    }
    for id in &live_ids {
        if let Err(resp) = authorize_mutation(&state, &headers, AccessAction::Delete, id).await {
            return resp.into_response();
        }
    }

    match state.catalog.delete_resources(&live_ids).await {
        Ok(deleted) => ok_response(json!({ "deleted_ids": deleted })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/copy",
    params(("id" = String, Path, description = "Source resource id")),
    responses(
        (status = 200, description = "The new deep copy owned by the caller", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse)
    )
)]
pub async fn deep_copy_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let caller = match require_caller(&headers) {
        Ok(c) => c,
        Err(resp) => return resp.into_response(),
    };
    if let Err(resp) = authorize_read(&state, &headers, &id).await {
        return resp.into_response();
    }
    match state.catalog.deep_copy_for_owner(&id, &caller).await {
        Ok(resource) => ok_response(json!({ "resource": resource })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/resources/{id}/children-count",
    params(("id" = String, Path, description = "Parent resource id")),
    responses(
        (status = 200, description = "Number of live children", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse)
    )
)]
pub async fn children_count_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(resp) = authorize_read(&state, &headers, &id).await {
        return resp.into_response();
    }
    match state.catalog.count_children(&[id]).await {
        Ok(count) => ok_response(json!({ "count": count })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}
