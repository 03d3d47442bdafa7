//! Authorization: permissions, role administration and per-request
//! resolution.
//!
//! A principal holds a set of roles; a role grants a set of
//! `(resource type, action)` permissions. A principal holds a permission when
//! any of its roles grants it.

pub mod admin;
pub mod permission;
pub mod resolver;

pub use admin::{RoleAdmin, default_roles};
pub use permission::{Action, Permission, Principal, ResourceType, RoleDefinition};
pub use resolver::{Decision, PermissionResolver};
