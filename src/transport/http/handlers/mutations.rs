use crate::domain::scope::AccessAction;
use crate::transport::http::handlers::common::{authorize_mutation, authorize_read};
use crate::transport::http::types::{
    error_response, json_422, ok_response, AddAttributesRequest, AddTagsRequest, ApiResponse,
    AppState, DeleteAttributesRequest, DeleteTagsRequest, GetAttributesRequest,
    UpdateAttributeRequest,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/tags/add",
    params(("id" = String, Path, description = "Resource id")),
    request_body = AddTagsRequest,
    responses(
        (status = 200, description = "Updated resource", body = ApiResponse),
        (status = 400, description = "Invalid tag", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse)
    )
)]
pub async fn add_tags_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    request: Result<Json<AddTagsRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"tags\": [...]}").into_response(),
    };
    if let Err(resp) = authorize_mutation(&state, &headers, AccessAction::Update, &id).await {
        return resp.into_response();
    }
    match state.catalog.add_tags(&id, &request.tags).await {
        Ok(resource) => ok_response(json!({ "resource": resource })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/tags/delete",
    params(("id" = String, Path, description = "Resource id")),
    request_body = DeleteTagsRequest,
    responses(
        (status = 200, description = "Updated resource", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse)
    )
)]
pub async fn delete_tags_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    request: Result<Json<DeleteTagsRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"tags\": [...], \"delete_all\": false}").into_response(),
    };
    if let Err(resp) = authorize_mutation(&state, &headers, AccessAction::Update, &id).await {
        return resp.into_response();
    }
    match state
        .catalog
        .delete_tags(&id, &request.tags, request.delete_all)
        .await
    {
        Ok(resource) => ok_response(json!({ "resource": resource })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/resources/{id}/tags",
    params(("id" = String, Path, description = "Resource id")),
    responses(
        (status = 200, description = "The resource's tags", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse)
    )
)]
pub async fn get_tags_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    match authorize_read(&state, &headers, &id).await {
        Ok(resource) => ok_response(json!({ "tags": resource.tags })).into_response(),
        Err(resp) => resp.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/attributes/add",
    params(("id" = String, Path, description = "Resource id")),
    request_body = AddAttributesRequest,
    responses(
        (status = 200, description = "Updated resource", body = ApiResponse),
        (status = 400, description = "Invalid attribute", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse),
        (status = 409, description = "Attribute key already exists", body = ApiResponse)
    )
)]
pub async fn add_attributes_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    request: Result<Json<AddAttributesRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"attributes\": [...]}").into_response(),
    };
    if let Err(resp) = authorize_mutation(&state, &headers, AccessAction::Update, &id).await {
        return resp.into_response();
    }
    match state.catalog.add_attributes(&id, &request.attributes).await {
        Ok(resource) => ok_response(json!({ "resource": resource })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/attributes/update",
    params(("id" = String, Path, description = "Resource id")),
    request_body = UpdateAttributeRequest,
    responses(
        (status = 200, description = "Updated resource plus rows_affected (0 = no-op)", body = ApiResponse),
        (status = 400, description = "Invalid attribute", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse)
    )
)]
pub async fn update_attribute_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    request: Result<Json<UpdateAttributeRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"attribute\": {...}}").into_response(),
    };
    if let Err(resp) = authorize_mutation(&state, &headers, AccessAction::Update, &id).await {
        return resp.into_response();
    }
    match state.catalog.update_attribute(&id, request.attribute).await {
        Ok((resource, rows_affected)) => ok_response(json!({
            "resource": resource,
            "rows_affected": rows_affected,
        }))
        .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/attributes/delete",
    params(("id" = String, Path, description = "Resource id")),
    request_body = DeleteAttributesRequest,
    responses(
        (status = 200, description = "Updated resource", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse)
    )
)]
pub async fn delete_attributes_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    request: Result<Json<DeleteAttributesRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(e, "{\"attribute_keys\": [...], \"delete_all\": false}")
                .into_response()
        }
    };
    if let Err(resp) = authorize_mutation(&state, &headers, AccessAction::Update, &id).await {
        return resp.into_response();
    }
    match state
        .catalog
        .delete_attributes(&id, &request.attribute_keys, request.delete_all)
        .await
    {
        Ok(resource) => ok_response(json!({ "resource": resource })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/resources/{id}/attributes/get",
    params(("id" = String, Path, description = "Resource id")),
    request_body = GetAttributesRequest,
    responses(
        (status = 200, description = "The requested attributes", body = ApiResponse),
        (status = 400, description = "Keys required unless get_all", body = ApiResponse),
        (status = 403, description = "Denied", body = ApiResponse),
        (status = 404, description = "No live resource with this id", body = ApiResponse)
    )
)]
pub async fn get_attributes_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    request: Result<Json<GetAttributesRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(e, "{\"attribute_keys\": [...], \"get_all\": false}").into_response()
        }
    };
    if let Err(resp) = authorize_read(&state, &headers, &id).await {
        return resp.into_response();
    }
    match state
        .catalog
        .get_attributes(&id, &request.attribute_keys, request.get_all)
        .await
    {
        Ok(attributes) => ok_response(json!({ "attributes": attributes })).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}
