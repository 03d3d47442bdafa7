//! Permission resolution against the clustered store.
//!
//! Every check reads the principal and its role definitions from the store;
//! nothing is cached, so a grant or revoke committed anywhere is visible to
//! the next check on any node.

use super::permission::{Permission, Principal, RoleDefinition};
use crate::error::HotelError;
use crate::state::keys;
use crate::types::{RoleName, UserId};
use hotel_ops_core::state_store::StateStore;
use hotel_ops_runtime::metrics::BookingMetrics;
use std::sync::Arc;

/// Reads before giving up when the principal keeps changing under us.
const MAX_SNAPSHOT_ATTEMPTS: usize = 3;

/// Outcome of a permission check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    /// Permission that was checked
    pub permission: Permission,
    /// Whether it is granted
    pub granted: bool,
    /// Human-readable explanation
    pub reason: String,
}

impl Decision {
    /// `Ok` when granted, otherwise [`HotelError::PermissionDenied`]
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::PermissionDenied`] carrying the reason.
    pub fn into_result(self) -> Result<(), HotelError> {
        if self.granted {
            Ok(())
        } else {
            Err(HotelError::PermissionDenied { permission: self.permission, reason: self.reason })
        }
    }
}

/// Resolves whether a principal's roles grant a permission
#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<dyn StateStore>,
}

impl PermissionResolver {
    /// Creates a new `PermissionResolver`
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Check whether `user` holds `permission` through any of their roles.
    ///
    /// The principal and its roles are read in one snapshot, so the answer
    /// reflects a single store revision.
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::Unavailable`] when the store cannot be read, or
    /// the principal keeps changing between reads.
    pub async fn check(&self, user: &UserId, permission: Permission) -> Result<Decision, HotelError> {
        let decision = self.resolve(user, permission).await?;
        BookingMetrics::record_permission_check(decision.granted);
        if decision.granted {
            tracing::debug!(user = %user, %permission, reason = %decision.reason, "Permission granted");
        } else {
            tracing::warn!(user = %user, %permission, reason = %decision.reason, "Permission denied");
        }
        Ok(decision)
    }

    async fn resolve(&self, user: &UserId, permission: Permission) -> Result<Decision, HotelError> {
        let principal_key = keys::principal(user);

        for _ in 0..MAX_SNAPSHOT_ATTEMPTS {
            let Some(entry) = self.store.get(&principal_key).await? else {
                return Ok(Decision {
                    permission,
                    granted: false,
                    reason: format!("User {user} not found"),
                });
            };
            let principal: Principal = entry.decode()?;

            let mut read_keys = vec![principal_key.clone()];
            read_keys.extend(principal.roles.iter().map(keys::role));
            let snapshot = self.store.snapshot(&read_keys).await?;

            // Roles must belong to the principal as of the snapshot revision.
            if snapshot.get(&principal_key).map(|e| e.revision) != Some(entry.revision) {
                tracing::debug!(user = %user, "Principal changed during check, re-reading");
                continue;
            }

            let mut granting: Option<&RoleName> = None;
            for role in &principal.roles {
                let Some(definition) = snapshot.decode::<RoleDefinition>(&keys::role(role))? else {
                    tracing::debug!(user = %user, role = %role, "Assigned role is not defined");
                    continue;
                };
                if definition.grants(permission) {
                    granting = Some(role);
                    break;
                }
            }

            return Ok(match granting {
                Some(role) => Decision {
                    permission,
                    granted: true,
                    reason: format!("Granted by role {role}"),
                },
                None => Decision {
                    permission,
                    granted: false,
                    reason: format!("Missing permission {permission} (roles: {})", describe_roles(&principal)),
                },
            });
        }

        Err(HotelError::Unavailable(format!("Principal {user} is changing too quickly to check")))
    }
}

fn describe_roles(principal: &Principal) -> String {
    if principal.roles.is_empty() {
        return "none".to_string();
    }
    principal.roles.iter().map(RoleName::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::authz::permission::{Action, ResourceType};
    use hotel_ops_core::state_store::{Expect, Write};
    use hotel_ops_runtime::InMemoryStateStore;

    const HOTEL_READ: Permission = Permission::new(ResourceType::Hotel, Action::Read);
    const HOTEL_DELETE: Permission = Permission::new(ResourceType::Hotel, Action::Delete);

    async fn store_with(roles: Vec<RoleDefinition>, principals: Vec<Principal>) -> Arc<dyn StateStore> {
        let store = Arc::new(InMemoryStateStore::new());
        let mut writes = Vec::new();
        for role in roles {
            writes.push(Write::put(keys::role(&role.name), Expect::Any, &role).unwrap());
        }
        for principal in principals {
            writes.push(Write::put(keys::principal(&principal.user_id), Expect::Any, &principal).unwrap());
        }
        store.commit(writes).await.unwrap();
        store
    }

    #[tokio::test]
    async fn granted_by_any_role() {
        let store = store_with(
            vec![RoleDefinition::new("viewer", [HOTEL_READ]), RoleDefinition::new("empty", [])],
            vec![Principal::new("alice", [RoleName::from("empty"), RoleName::from("viewer")])],
        )
        .await;
        let resolver = PermissionResolver::new(store);

        let decision = resolver.check(&UserId::from("alice"), HOTEL_READ).await.unwrap();
        assert!(decision.granted);
        assert_eq!(decision.reason, "Granted by role viewer");
    }

    #[tokio::test]
    async fn denial_names_missing_permission() {
        let store = store_with(
            vec![RoleDefinition::new("viewer", [HOTEL_READ])],
            vec![Principal::new("alice", [RoleName::from("viewer")])],
        )
        .await;
        let resolver = PermissionResolver::new(store);

        let decision = resolver.check(&UserId::from("alice"), HOTEL_DELETE).await.unwrap();
        assert!(!decision.granted);
        assert_eq!(decision.reason, "Missing permission Hotel:Delete (roles: viewer)");
        assert!(matches!(
            decision.into_result(),
            Err(HotelError::PermissionDenied { permission: HOTEL_DELETE, .. })
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_denied() {
        let resolver = PermissionResolver::new(store_with(vec![], vec![]).await);
        let decision = resolver.check(&UserId::from("mallory"), HOTEL_READ).await.unwrap();
        assert!(!decision.granted);
        assert_eq!(decision.reason, "User mallory not found");
    }

    #[tokio::test]
    async fn undefined_role_grants_nothing() {
        let store = store_with(vec![], vec![Principal::new("bob", [RoleName::from("ghost")])]).await;
        let resolver = PermissionResolver::new(store);

        let decision = resolver.check(&UserId::from("bob"), HOTEL_READ).await.unwrap();
        assert!(!decision.granted);
        assert!(decision.reason.contains("roles: ghost"));
    }

    #[tokio::test]
    async fn grants_are_visible_to_the_next_check() {
        let store = store_with(
            vec![RoleDefinition::new("viewer", [])],
            vec![Principal::new("alice", [RoleName::from("viewer")])],
        )
        .await;
        let resolver = PermissionResolver::new(Arc::clone(&store));
        assert!(!resolver.check(&UserId::from("alice"), HOTEL_READ).await.unwrap().granted);

        let updated = RoleDefinition::new("viewer", [HOTEL_READ]);
        store
            .commit(vec![Write::put(keys::role(&updated.name), Expect::Any, &updated).unwrap()])
            .await
            .unwrap();

        assert!(resolver.check(&UserId::from("alice"), HOTEL_READ).await.unwrap().granted);
    }
}
