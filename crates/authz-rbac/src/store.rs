//! Role binding persistence seam
//!
//! Uniqueness rules live here, not in callers: role names per organization,
//! permission `(resource, action)` pairs, and both binding pairs. Role
//! deletion is refused while user bindings remain; the inverse is always
//! allowed, so a role may drop to zero assignees.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use authz_common::{AuthzError, AuthzResult, OrganizationId, PermissionId, RoleId, UserId};

use crate::model::{Permission, Role, RolePermission, UserRole};

/// Storage seam for roles, permissions, and their bindings
#[async_trait]
pub trait RoleBindingStore: Send + Sync {
    /// Insert a role; `Conflict` when the (organization, name) pair is taken
    async fn create_role(&self, role: Role) -> AuthzResult<Role>;

    /// Role by id
    async fn role(&self, id: RoleId) -> AuthzResult<Option<Role>>;

    /// Delete a role and its permission bindings; `BadRequest` while user
    /// bindings remain
    async fn delete_role(&self, id: RoleId) -> AuthzResult<()>;

    /// Insert a permission; `Conflict` when (resource, action) is taken
    async fn create_permission(&self, permission: Permission) -> AuthzResult<Permission>;

    /// Permission by id
    async fn permission(&self, id: PermissionId) -> AuthzResult<Option<Permission>>;

    /// Bind a permission to a role; `Conflict` when already bound
    async fn bind_permission(&self, role_id: RoleId, permission_id: PermissionId)
        -> AuthzResult<()>;

    /// Remove a permission binding; `NotFound` when it does not exist
    async fn unbind_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AuthzResult<()>;

    /// Bind a role to a user; `Conflict` when already bound
    async fn bind_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
        granted_by: Option<UserId>,
    ) -> AuthzResult<()>;

    /// Remove a role binding; `NotFound` when it does not exist
    async fn unbind_role(&self, user_id: UserId, role_id: RoleId) -> AuthzResult<()>;

    /// Roles bound to a user; empty when the user has none
    async fn roles_for_user(&self, user_id: UserId) -> AuthzResult<Vec<Role>>;

    /// Permissions bound to any of the given roles, with duplicates
    async fn permissions_for_roles(&self, role_ids: &[RoleId]) -> AuthzResult<Vec<Permission>>;
}

#[derive(Default)]
struct RbacState {
    roles: HashMap<RoleId, Role>,
    role_names: HashMap<(Option<OrganizationId>, String), RoleId>,
    permissions: HashMap<PermissionId, Permission>,
    permission_keys: HashMap<String, PermissionId>,
    role_permissions: HashMap<(RoleId, PermissionId), RolePermission>,
    user_roles: HashMap<(UserId, RoleId), UserRole>,
}

/// In-memory role binding store
///
/// One lock over all RBAC state keeps check-then-insert atomic.
pub struct InMemoryRoleBindingStore {
    inner: RwLock<RbacState>,
}

impl InMemoryRoleBindingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RbacState::default()),
        }
    }
}

impl Default for InMemoryRoleBindingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleBindingStore for InMemoryRoleBindingStore {
    async fn create_role(&self, role: Role) -> AuthzResult<Role> {
        let mut state = self.inner.write();
        let name_key = (role.organization_id, role.name.clone());
        if state.role_names.contains_key(&name_key) {
            return Err(AuthzError::Conflict(format!(
                "role '{}' already exists in this organization",
                role.name
            )));
        }
        state.role_names.insert(name_key, role.id);
        state.roles.insert(role.id, role.clone());
        tracing::info!("Role created: {}", role.name);
        Ok(role)
    }

    async fn role(&self, id: RoleId) -> AuthzResult<Option<Role>> {
        Ok(self.inner.read().roles.get(&id).cloned())
    }

    async fn delete_role(&self, id: RoleId) -> AuthzResult<()> {
        let mut state = self.inner.write();
        let role = state
            .roles
            .get(&id)
            .cloned()
            .ok_or_else(|| AuthzError::NotFound(format!("role {}", id)))?;

        let assigned = state.user_roles.keys().filter(|(_, r)| *r == id).count();
        if assigned > 0 {
            return Err(AuthzError::BadRequest(format!(
                "cannot delete role '{}' while assigned to {} user(s)",
                role.name, assigned
            )));
        }

        state.role_permissions.retain(|(r, _), _| *r != id);
        state.role_names.remove(&(role.organization_id, role.name.clone()));
        state.roles.remove(&id);
        tracing::info!("Role deleted: {}", role.name);
        Ok(())
    }

    async fn create_permission(&self, permission: Permission) -> AuthzResult<Permission> {
        let mut state = self.inner.write();
        let key = permission.key();
        if state.permission_keys.contains_key(&key) {
            return Err(AuthzError::Conflict(format!(
                "permission '{}' already exists",
                key
            )));
        }
        state.permission_keys.insert(key, permission.id);
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn permission(&self, id: PermissionId) -> AuthzResult<Option<Permission>> {
        Ok(self.inner.read().permissions.get(&id).cloned())
    }

    async fn bind_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AuthzResult<()> {
        let mut state = self.inner.write();
        if !state.roles.contains_key(&role_id) {
            return Err(AuthzError::NotFound(format!("role {}", role_id)));
        }
        if !state.permissions.contains_key(&permission_id) {
            return Err(AuthzError::NotFound(format!("permission {}", permission_id)));
        }
        let key = (role_id, permission_id);
        if state.role_permissions.contains_key(&key) {
            return Err(AuthzError::Conflict(
                "permission already assigned to role".into(),
            ));
        }
        state.role_permissions.insert(
            key,
            RolePermission {
                role_id,
                permission_id,
            },
        );
        Ok(())
    }

    async fn unbind_permission(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AuthzResult<()> {
        self.inner
            .write()
            .role_permissions
            .remove(&(role_id, permission_id))
            .map(|_| ())
            .ok_or_else(|| AuthzError::NotFound("permission not assigned to role".into()))
    }

    async fn bind_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
        granted_by: Option<UserId>,
    ) -> AuthzResult<()> {
        let mut state = self.inner.write();
        if !state.roles.contains_key(&role_id) {
            return Err(AuthzError::NotFound(format!("role {}", role_id)));
        }
        let key = (user_id, role_id);
        if state.user_roles.contains_key(&key) {
            return Err(AuthzError::Conflict("role already assigned to user".into()));
        }
        state.user_roles.insert(
            key,
            UserRole {
                user_id,
                role_id,
                granted_by,
                granted_at: chrono::Utc::now(),
            },
        );
        Ok(())
    }

    async fn unbind_role(&self, user_id: UserId, role_id: RoleId) -> AuthzResult<()> {
        self.inner
            .write()
            .user_roles
            .remove(&(user_id, role_id))
            .map(|_| ())
            .ok_or_else(|| AuthzError::NotFound("role not assigned to user".into()))
    }

    async fn roles_for_user(&self, user_id: UserId) -> AuthzResult<Vec<Role>> {
        let state = self.inner.read();
        Ok(state
            .user_roles
            .keys()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, r)| state.roles.get(r))
            .cloned()
            .collect())
    }

    async fn permissions_for_roles(&self, role_ids: &[RoleId]) -> AuthzResult<Vec<Permission>> {
        let state = self.inner.read();
        Ok(state
            .role_permissions
            .keys()
            .filter(|(r, _)| role_ids.contains(r))
            .filter_map(|(_, p)| state.permissions.get(p))
            .cloned()
            .collect())
    }
}
