//! Typed error taxonomy shared by every public entry point.

use thiserror::Error;

/// Errors surfaced by the catalog core.
///
/// Every public operation returns either a successful typed result or exactly
/// one of these kinds with a human-readable message. Validation failures are
/// raised before any store interaction; collaborator failures are never
/// coerced into an empty result.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Malformed or missing required field, illegal predicate.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The id does not resolve to a live, non-deleted resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// Create-once conflict (e.g. duplicate attribute key).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Scope resolution excludes the target.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Store or authorization collaborator unreachable / timed out.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Unexpected failure inside the store or the service itself.
    #[error("internal error: {0}")]
    Internal(String),
}

/// True for infrastructure failures worth a bounded retry: connection-level
/// errors and the store's serialization/deadlock aborts. Logical failures
/// never qualify.
pub fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => matches!(db.code().as_deref(), Some("40001") | Some("40P01")),
        _ => false,
    }
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        if is_transient(&err) {
            CatalogError::Unavailable(err.to_string())
        } else {
            match err {
                sqlx::Error::PoolClosed | sqlx::Error::Tls(_) => {
                    CatalogError::Unavailable(err.to_string())
                }
                other => CatalogError::Internal(other.to_string()),
            }
        }
    }
}
