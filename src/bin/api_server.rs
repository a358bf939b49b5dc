// src/bin/api_server.rs

use catalog_api::infra::config;
use catalog_api::{storage, transport, CatalogService, RemoteAccessControl, ScopeResolver, TracingAuditSink};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // --- Store Initialization ---
    tracing::info!("connecting to store");
    let pool = storage::connect_pool().await?;
    storage::ensure_schema(&pool).await?;
    tracing::info!("schema ensured");

    // --- Collaborators ---
    let access = Arc::new(RemoteAccessControl::from_env());
    let resolver = Arc::new(ScopeResolver::new(
        access,
        pool.clone(),
        config::authz_timeout(),
    ));
    let catalog = Arc::new(CatalogService::new(
        pool,
        Arc::new(TracingAuditSink),
        config::copy_chunk_size(),
    ));

    let app_state = transport::http::AppState { catalog, resolver };

    // --- API Server Initialization ---
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url(
            "/api-docs/openapi.json",
            transport::http::ApiDoc::openapi(),
        ))
        .layer(cors);

    let bind_addr = config::bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "API server listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
