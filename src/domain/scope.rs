//! Authorization scope: the set of resource ids a caller may act on.
//!
//! A scope is the immutable result of one resolution, owned by the request
//! that produced it. It is never persisted or cached across requests.

use std::collections::BTreeSet;

/// The action a scope was computed for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessAction {
    Read,
    Update,
    Delete,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::Read => "read",
            AccessAction::Update => "update",
            AccessAction::Delete => "delete",
        }
    }
}

/// What the authorization collaborator granted: everything (admin-grade) or
/// an explicit id set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessible {
    All,
    Ids(BTreeSet<String>),
}

/// The resolved scope. `RestrictedTo` with an empty set means "nothing":
/// the executor must short-circuit, never treat it as "no filter".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationScope {
    pub action: AccessAction,
    pub access: Access,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Unrestricted,
    RestrictedTo(BTreeSet<String>),
}

impl AuthorizationScope {
    pub fn unrestricted(action: AccessAction) -> Self {
        Self {
            action,
            access: Access::Unrestricted,
        }
    }

    pub fn restricted(action: AccessAction, ids: BTreeSet<String>) -> Self {
        Self {
            action,
            access: Access::RestrictedTo(ids),
        }
    }

    /// True iff the scope is an empty `RestrictedTo`.
    pub fn is_empty(&self) -> bool {
        matches!(&self.access, Access::RestrictedTo(ids) if ids.is_empty())
    }

    /// Narrows the scope to `hint` by set intersection. An unrestricted
    /// scope narrows to exactly the hint, which keeps an explicit-ids
    /// lookup from turning into a full-catalog listing.
    pub fn intersect(self, hint: &BTreeSet<String>) -> Self {
        let access = match self.access {
            Access::Unrestricted => Access::RestrictedTo(hint.clone()),
            Access::RestrictedTo(ids) => {
                Access::RestrictedTo(ids.intersection(hint).cloned().collect())
            }
        };
        Self {
            action: self.action,
            access,
        }
    }
}

/// Merges the collaborator grant with owned ids (owners always retain
/// access) and, when the requested visibility includes PUBLIC, the publicly
/// visible ids.
pub fn merge_access(
    grant: Accessible,
    owned: BTreeSet<String>,
    public: Option<BTreeSet<String>>,
) -> Access {
    match grant {
        Accessible::All => Access::Unrestricted,
        Accessible::Ids(mut ids) => {
            ids.extend(owned);
            if let Some(public_ids) = public {
                ids.extend(public_ids);
            }
            Access::RestrictedTo(ids)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn admin_grant_is_unrestricted() {
        let access = merge_access(Accessible::All, ids(&["p1"]), Some(ids(&["p2"])));
        assert_eq!(access, Access::Unrestricted);
    }

    #[test]
    fn grant_unions_owned_and_public() {
        let access = merge_access(
            Accessible::Ids(ids(&["shared1"])),
            ids(&["mine1", "mine2"]),
            Some(ids(&["pub1"])),
        );
        assert_eq!(
            access,
            Access::RestrictedTo(ids(&["shared1", "mine1", "mine2", "pub1"]))
        );
    }

    #[test]
    fn private_visibility_excludes_public_ids() {
        let access = merge_access(Accessible::Ids(ids(&["shared1"])), ids(&["mine1"]), None);
        assert_eq!(access, Access::RestrictedTo(ids(&["shared1", "mine1"])));
    }

    #[test]
    fn hint_intersection_narrows_restricted_scope() {
        let scope = AuthorizationScope::restricted(AccessAction::Read, ids(&["p1", "p2", "p3"]));
        let narrowed = scope.intersect(&ids(&["p2", "p4"]));
        assert_eq!(narrowed.access, Access::RestrictedTo(ids(&["p2"])));
    }

    #[test]
    fn hint_intersection_narrows_unrestricted_scope_to_the_hint() {
        let scope = AuthorizationScope::unrestricted(AccessAction::Read);
        let narrowed = scope.intersect(&ids(&["p1"]));
        assert_eq!(narrowed.access, Access::RestrictedTo(ids(&["p1"])));
    }

    #[test]
    fn empty_restricted_scope_is_detected() {
        let scope = AuthorizationScope::restricted(AccessAction::Read, BTreeSet::new());
        assert!(scope.is_empty());
        assert!(!AuthorizationScope::unrestricted(AccessAction::Read).is_empty());
    }
}
