//! Resolves a caller + action into an authorization scope.
//!
//! The collaborator call is the only cross-process blocking point on the
//! read path: it carries a timeout and fails closed. A timeout or transport
//! error surfaces `Unavailable`; the resolver never silently narrows to
//! owned-only access and never silently widens to unrestricted.

use crate::domain::entity::{ResourceKind, Visibility};
use crate::domain::error::CatalogError;
use crate::domain::scope::{merge_access, AccessAction, AuthorizationScope};
use crate::infra::authz::AccessControl;
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Whether anonymous callers may list this resource type at all.
/// Nested resources are only reachable through their parents.
fn permits_public_listing(kind: ResourceKind) -> bool {
    matches!(kind, ResourceKind::Project | ResourceKind::Dataset)
}

pub struct ScopeResolver {
    access: Arc<dyn AccessControl>,
    pool: PgPool,
    timeout: Duration,
}

impl ScopeResolver {
    pub fn new(access: Arc<dyn AccessControl>, pool: PgPool, timeout: Duration) -> Self {
        Self {
            access,
            pool,
            timeout,
        }
    }

    /// Produces the scope for one request. No caching: the result reflects
    /// authorization state at call time and is owned by this request alone.
    pub async fn resolve(
        &self,
        caller: Option<&str>,
        action: AccessAction,
        kind: ResourceKind,
        workspace: &str,
        visibility: Visibility,
        hint: Option<BTreeSet<String>>,
    ) -> Result<AuthorizationScope, CatalogError> {
        let caller = match caller {
            None => {
                if action != AccessAction::Read || !permits_public_listing(kind) {
                    return Err(CatalogError::PermissionDenied(
                        "anonymous callers may only list public projects and datasets".to_string(),
                    ));
                }
                let public = self.public_ids(kind, workspace).await?;
                let mut scope = AuthorizationScope::restricted(action, public);
                if let Some(hint) = hint {
                    scope = scope.intersect(&hint);
                }
                return Ok(scope);
            }
            Some(caller) => caller,
        };

        let grant = tokio::time::timeout(self.timeout, self.access.accessible_ids(caller, action, kind))
            .await
            .map_err(|_| {
                CatalogError::Unavailable("authorization collaborator timed out".to_string())
            })?
            .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        let owned = self.owned_ids(caller, kind, workspace).await?;
        let public = match visibility {
            Visibility::Public | Visibility::Organization => {
                Some(self.public_ids(kind, workspace).await?)
            }
            Visibility::Private => None,
        };

        let mut scope = AuthorizationScope {
            action,
            access: merge_access(grant, owned, public),
        };
        if let Some(hint) = hint {
            scope = scope.intersect(&hint);
        }
        Ok(scope)
    }

    /// Single-resource permission gate for mutation entry points. Owners
    /// always pass; everyone else goes through the collaborator, fail
    /// closed.
    pub async fn ensure_permitted(
        &self,
        caller: Option<&str>,
        action: AccessAction,
        resource_id: &str,
    ) -> Result<(), CatalogError> {
        let caller = caller.ok_or_else(|| {
            CatalogError::PermissionDenied("caller identity required".to_string())
        })?;

        if self.is_owner(caller, resource_id).await? {
            return Ok(());
        }

        let allowed = tokio::time::timeout(
            self.timeout,
            self.access.check_permission(caller, action, resource_id),
        )
        .await
        .map_err(|_| CatalogError::Unavailable("authorization collaborator timed out".to_string()))?
        .map_err(|e| CatalogError::Unavailable(e.to_string()))?;

        if allowed {
            Ok(())
        } else {
            Err(CatalogError::PermissionDenied(format!(
                "'{}' may not {} resource '{}'",
                caller,
                action.as_str(),
                resource_id
            )))
        }
    }

    async fn is_owner(&self, caller: &str, resource_id: &str) -> Result<bool, CatalogError> {
        let row = sqlx::query("SELECT owner FROM resources WHERE id = $1 AND NOT deleted")
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .map(|r| r.try_get::<String, _>("owner"))
            .transpose()?
            .is_some_and(|owner| owner == caller))
    }

    async fn owned_ids(
        &self,
        caller: &str,
        kind: ResourceKind,
        workspace: &str,
    ) -> Result<BTreeSet<String>, CatalogError> {
        let rows = sqlx::query(
            "SELECT id FROM resources
             WHERE kind = $1 AND owner = $2 AND workspace = $3 AND NOT deleted",
        )
        .bind(kind.as_str())
        .bind(caller)
        .bind(workspace)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("id").map_err(CatalogError::from))
            .collect()
    }

    async fn public_ids(
        &self,
        kind: ResourceKind,
        workspace: &str,
    ) -> Result<BTreeSet<String>, CatalogError> {
        let rows = sqlx::query(
            "SELECT id FROM resources
             WHERE kind = $1 AND visibility = 'public' AND workspace = $2 AND NOT deleted",
        )
        .bind(kind.as_str())
        .bind(workspace)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("id").map_err(CatalogError::from))
            .collect()
    }
}
