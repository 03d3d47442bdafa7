//! Role and principal administration.
//!
//! All changes are compare-and-set commits against the store, retried on
//! contention. Role changes take effect at the next permission check on
//! any node.

use super::permission::{Action, Permission, Principal, ResourceType, RoleDefinition};
use crate::error::HotelError;
use crate::state::{commit_with_retries, keys};
use crate::types::{RoleName, UserId};
use hotel_ops_core::state::StateKey;
use hotel_ops_core::state_store::{Expect, StateStore, Write};
use hotel_ops_runtime::RetryPolicy;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Built-in roles
///
/// | Role | Permissions |
/// |---|---|
/// | `admin` | everything |
/// | `manager` | Read, Create, Update on hotels, rooms and reservations |
/// | `receptionist` | Read hotels and rooms; Read, Create, Update reservations |
/// | `guest` | Read hotels and rooms; Create reservations |
#[must_use]
pub fn default_roles() -> Vec<RoleDefinition> {
    let day_to_day = [Action::Read, Action::Create, Action::Update];
    let read = |resource| Permission::new(resource, Action::Read);

    vec![
        RoleDefinition::new("admin", Permission::all()),
        RoleDefinition::new(
            "manager",
            [ResourceType::Hotel, ResourceType::Room, ResourceType::Reservation]
                .into_iter()
                .flat_map(|resource| day_to_day.map(|action| Permission::new(resource, action))),
        ),
        RoleDefinition::new(
            "receptionist",
            [read(ResourceType::Hotel), read(ResourceType::Room)]
                .into_iter()
                .chain(day_to_day.map(|action| Permission::new(ResourceType::Reservation, action))),
        ),
        RoleDefinition::new(
            "guest",
            [
                read(ResourceType::Hotel),
                read(ResourceType::Room),
                Permission::new(ResourceType::Reservation, Action::Create),
            ],
        ),
    ]
}

/// Administers roles and role assignments
#[derive(Clone)]
pub struct RoleAdmin {
    store: Arc<dyn StateStore>,
    retry: RetryPolicy,
}

impl RoleAdmin {
    /// Creates a new `RoleAdmin`
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Create or replace a role definition.
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::Validation`] for a blank role name, or a store
    /// failure.
    pub async fn define_role(&self, role: RoleDefinition) -> Result<(), HotelError> {
        if role.name.as_str().trim().is_empty() {
            return Err(HotelError::Validation("Role name is required".to_string()));
        }
        let key = keys::role(&role.name);
        self.modify::<RoleDefinition, _>(&key, |current| {
            Ok((current.as_ref() != Some(&role)).then(|| role.clone()))
        })
        .await?;
        tracing::info!(role = %role.name, permissions = role.permissions.len(), "Role defined");
        Ok(())
    }

    /// Add `permission` to an existing role. Granting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::Validation`] if the role does not exist.
    pub async fn grant(&self, role: &RoleName, permission: Permission) -> Result<(), HotelError> {
        let changed = self
            .modify::<RoleDefinition, _>(&keys::role(role), |current| {
                let mut definition = current.ok_or_else(|| role_not_found(role))?;
                Ok(definition.permissions.insert(permission).then_some(definition))
            })
            .await?;
        if changed {
            tracing::info!(role = %role, %permission, "Permission granted to role");
        }
        Ok(())
    }

    /// Remove `permission` from an existing role.
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::Validation`] if the role does not exist.
    pub async fn revoke(&self, role: &RoleName, permission: Permission) -> Result<(), HotelError> {
        let changed = self
            .modify::<RoleDefinition, _>(&keys::role(role), |current| {
                let mut definition = current.ok_or_else(|| role_not_found(role))?;
                Ok(definition.permissions.remove(&permission).then_some(definition))
            })
            .await?;
        if changed {
            tracing::info!(role = %role, %permission, "Permission revoked from role");
        }
        Ok(())
    }

    /// Assign an existing role to a user, creating the principal if needed.
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::Validation`] if the role does not exist.
    pub async fn assign_role(&self, user: &UserId, role: &RoleName) -> Result<(), HotelError> {
        if self.store.get(&keys::role(role)).await?.is_none() {
            return Err(role_not_found(role));
        }
        self.modify::<Principal, _>(&keys::principal(user), |current| {
            let mut principal = current.unwrap_or_else(|| Principal::new(user.clone(), []));
            Ok(principal.roles.insert(role.clone()).then_some(principal))
        })
        .await?;
        tracing::info!(user = %user, role = %role, "Role assigned");
        Ok(())
    }

    /// Remove a role from a user. Unknown users and roles are a no-op.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn unassign_role(&self, user: &UserId, role: &RoleName) -> Result<(), HotelError> {
        self.modify::<Principal, _>(&keys::principal(user), |current| {
            Ok(current.and_then(|mut principal| principal.roles.remove(role).then_some(principal)))
        })
        .await?;
        Ok(())
    }

    /// Roles assigned to a user
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn roles_of(&self, user: &UserId) -> Result<BTreeSet<RoleName>, HotelError> {
        let principal = match self.store.get(&keys::principal(user)).await? {
            Some(entry) => Some(entry.decode::<Principal>()?),
            None => None,
        };
        Ok(principal.map(|principal| principal.roles).unwrap_or_default())
    }

    /// Define every [`default_roles`] entry that does not exist yet.
    ///
    /// Existing roles are left alone. Returns how many were created.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn seed_default_roles(&self) -> Result<usize, HotelError> {
        let mut created = 0;
        for role in default_roles() {
            let key = keys::role(&role.name);
            if self.modify::<RoleDefinition, _>(&key, |current| Ok(current.is_none().then(|| role.clone()))).await? {
                created += 1;
            }
        }
        tracing::info!(created, "Default roles seeded");
        Ok(created)
    }

    /// Read-modify-write one entry. `change` returns the new value, or
    /// `None` to leave the entry as it is. Returns whether a write happened.
    async fn modify<T, F>(&self, key: &StateKey, change: F) -> Result<bool, HotelError>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Option<T>) -> Result<Option<T>, HotelError>,
    {
        let store = &self.store;
        let change = &change;
        commit_with_retries(&self.retry, move || async move {
            let entry = store.get(key).await?;
            let current = entry.as_ref().map(|entry| entry.decode::<T>()).transpose()?;
            let Some(next) = change(current)? else {
                return Ok(false);
            };
            store.commit(vec![Write::put(key.clone(), Expect::observed(entry.as_ref()), &next)?]).await?;
            Ok(true)
        })
        .await
    }
}

fn role_not_found(role: &RoleName) -> HotelError {
    HotelError::Validation(format!("Role {role} not found"))
}
