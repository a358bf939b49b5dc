//! Schema bootstrap and pool construction for the catalog store.

use crate::domain::error::CatalogError;
use crate::infra::config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connects to Postgres using `DATABASE_URL`.
pub async fn connect_pool() -> Result<PgPool, CatalogError> {
    let database_url = config::database_url();
    PgPoolOptions::new()
        .max_connections(config::max_connections())
        .connect(&database_url)
        .await
        .map_err(|e| CatalogError::Unavailable(format!("cannot connect to store: {}", e)))
}

/// Creates the `resources` table and its indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), CatalogError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS resources (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            owner TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            readme TEXT NOT NULL DEFAULT '',
            tags JSONB NOT NULL DEFAULT '[]',
            attributes JSONB NOT NULL DEFAULT '{}',
            visibility TEXT NOT NULL DEFAULT 'private',
            workspace TEXT NOT NULL,
            parent_id TEXT,
            date_created TIMESTAMPTZ NOT NULL,
            date_updated TIMESTAMPTZ NOT NULL,
            deleted BOOLEAN NOT NULL DEFAULT FALSE
        )",
    )
    .execute(pool)
    .await?;

    // parent_id drives the cascade walk; the composite index serves the
    // workspace-scoped listing path.
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resources_parent ON resources (parent_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_resources_kind_workspace
         ON resources (kind, workspace) WHERE NOT deleted",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_resources_owner ON resources (owner)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_resources_date_updated ON resources (date_updated)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
