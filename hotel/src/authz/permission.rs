//! Permissions, roles and principals.

use crate::error::HotelError;
use crate::types::{RoleName, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of resource a permission applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    /// Hotels
    Hotel,
    /// Rooms
    Room,
    /// Reservations
    Reservation,
    /// User accounts
    User,
    /// Roles and their permissions
    Role,
}

impl ResourceType {
    /// Every resource type
    pub const ALL: [Self; 5] = [Self::Hotel, Self::Room, Self::Reservation, Self::User, Self::Role];

    /// Canonical name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hotel => "Hotel",
            Self::Room => "Room",
            Self::Reservation => "Reservation",
            Self::User => "User",
            Self::Role => "Role",
        }
    }
}

/// Operation on a resource
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Read
    Read,
    /// Create
    Create,
    /// Update, including lifecycle transitions
    Update,
    /// Delete
    Delete,
    /// Administer
    Manage,
}

impl Action {
    /// Every action
    pub const ALL: [Self; 5] = [Self::Read, Self::Create, Self::Update, Self::Delete, Self::Manage];

    /// Canonical name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Manage => "Manage",
        }
    }
}

fn parse_name<T: Copy>(all: &[T], name: &str, label: fn(T) -> &'static str, kind: &str) -> Result<T, HotelError> {
    let name = name.trim();
    all.iter()
        .copied()
        .find(|candidate| label(*candidate).eq_ignore_ascii_case(name))
        .ok_or_else(|| HotelError::Validation(format!("Unknown {kind} '{name}'")))
}

impl FromStr for ResourceType {
    type Err = HotelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(&Self::ALL, s, Self::as_str, "resource type")
    }
}

impl FromStr for Action {
    type Err = HotelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_name(&Self::ALL, s, Self::as_str, "action")
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (resource type, action) pair
///
/// # Example
///
/// ```
/// use hotel::authz::{Action, Permission, ResourceType};
///
/// let permission: Permission = "hotel:read".parse().unwrap();
/// assert_eq!(permission, Permission::new(ResourceType::Hotel, Action::Read));
/// assert_eq!(permission.to_string(), "Hotel:Read");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Resource type
    pub resource: ResourceType,
    /// Action
    pub action: Action,
}

impl Permission {
    /// Creates a new `Permission`
    #[must_use]
    pub const fn new(resource: ResourceType, action: Action) -> Self {
        Self { resource, action }
    }

    /// Every permission there is
    pub fn all() -> impl Iterator<Item = Self> {
        ResourceType::ALL
            .into_iter()
            .flat_map(|resource| Action::ALL.into_iter().map(move |action| Self::new(resource, action)))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl FromStr for Permission {
    type Err = HotelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, action) = s
            .split_once(':')
            .ok_or_else(|| HotelError::Validation(format!("Permission '{s}' is not of the form Resource:Action")))?;
        Ok(Self::new(resource.parse()?, action.parse()?))
    }
}

/// Named set of permissions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Role name
    pub name: RoleName,
    /// Granted permissions
    pub permissions: BTreeSet<Permission>,
}

impl RoleDefinition {
    /// Role granting `permissions`
    #[must_use]
    pub fn new(name: impl Into<RoleName>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self { name: name.into(), permissions: permissions.into_iter().collect() }
    }

    /// Whether the role grants `permission`
    #[must_use]
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

/// An acting user and the roles assigned to them
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// User id
    pub user_id: UserId,
    /// Assigned roles
    pub roles: BTreeSet<RoleName>,
}

impl Principal {
    /// Principal with the given roles
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, roles: impl IntoIterator<Item = RoleName>) -> Self {
        Self { user_id: user_id.into(), roles: roles.into_iter().collect() }
    }
}
