//! OpenAuthz RBAC - Role bindings and permission resolution
//!
//! Two pieces: `RoleBindingStore` holds role and permission definitions plus
//! the role-permission and user-role bindings, with every uniqueness rule
//! enforced at the storage layer; `PermissionResolver` turns a user id into
//! the de-duplicated set of `resource:action` strings reachable through
//! that user's bindings.
//!
//! Resolution is set union over store queries keyed by id. There is no
//! in-memory object graph to walk and no ambient identity: the user id is
//! an explicit parameter everywhere.

#![warn(missing_docs)]

pub mod model;
pub mod resolver;
pub mod store;

pub use model::{Permission, Role, RoleKind, RolePermission, UserRole};
pub use resolver::PermissionResolver;
pub use store::{InMemoryRoleBindingStore, RoleBindingStore};
