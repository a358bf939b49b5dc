use crate::transport::http::handlers::{health, mutations, resources};
use crate::transport::http::types::{
    AddAttributesRequest, AddTagsRequest, ApiResponse, CreateResourceRequest,
    DeleteAttributesRequest, DeleteResourcesRequest, DeleteTagsRequest, FindResourcesRequest,
    GetAttributesRequest, UpdateAttributeRequest, UpdateResourceRequest,
};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        resources::find_resources_handler,
        resources::create_resource_handler,
        resources::get_resource_handler,
        resources::update_resource_handler,
        resources::delete_resources_handler,
        resources::deep_copy_handler,
        resources::children_count_handler,
        mutations::add_tags_handler,
        mutations::delete_tags_handler,
        mutations::get_tags_handler,
        mutations::add_attributes_handler,
        mutations::update_attribute_handler,
        mutations::delete_attributes_handler,
        mutations::get_attributes_handler
    ),
    components(schemas(
        ApiResponse,
        FindResourcesRequest,
        CreateResourceRequest,
        UpdateResourceRequest,
        DeleteResourcesRequest,
        AddTagsRequest,
        DeleteTagsRequest,
        AddAttributesRequest,
        UpdateAttributeRequest,
        DeleteAttributesRequest,
        GetAttributesRequest
    ))
)]
#[allow(dead_code)]
pub struct ApiDoc;

pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/api/v1/:kind/find", post(resources::find_resources_handler))
        .route("/api/v1/:kind/delete", post(resources::delete_resources_handler))
        .route("/api/v1/:kind", post(resources::create_resource_handler))
        .route("/api/v1/resources/:id", get(resources::get_resource_handler))
        .route(
            "/api/v1/resources/:id/update",
            post(resources::update_resource_handler),
        )
        .route("/api/v1/resources/:id/copy", post(resources::deep_copy_handler))
        .route(
            "/api/v1/resources/:id/children-count",
            get(resources::children_count_handler),
        )
        .route("/api/v1/resources/:id/tags", get(mutations::get_tags_handler))
        .route("/api/v1/resources/:id/tags/add", post(mutations::add_tags_handler))
        .route(
            "/api/v1/resources/:id/tags/delete",
            post(mutations::delete_tags_handler),
        )
        .route(
            "/api/v1/resources/:id/attributes/add",
            post(mutations::add_attributes_handler),
        )
        .route(
            "/api/v1/resources/:id/attributes/update",
            post(mutations::update_attribute_handler),
        )
        .route(
            "/api/v1/resources/:id/attributes/delete",
            post(mutations::delete_attributes_handler),
        )
        .route(
            "/api/v1/resources/:id/attributes/get",
            post(mutations::get_attributes_handler),
        )
        .with_state(app_state)
}
