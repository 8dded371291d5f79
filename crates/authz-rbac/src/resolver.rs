//! Permission resolution
//!
//! A permission reachable through two roles counts once; a user with no
//! role bindings resolves to the empty set, never an error. Callers decide
//! whether an empty result is a denial.

use std::collections::HashSet;
use std::sync::Arc;

use authz_common::{AuthzResult, RoleId, UserId};

use crate::store::RoleBindingStore;

/// Resolves a user's effective permissions through role bindings
pub struct PermissionResolver {
    store: Arc<dyn RoleBindingStore>,
}

impl PermissionResolver {
    /// Create a resolver over a binding store
    pub fn new(store: Arc<dyn RoleBindingStore>) -> Self {
        Self { store }
    }

    /// De-duplicated `resource:action` strings reachable through the user's
    /// roles
    pub async fn list_permissions(&self, user_id: UserId) -> AuthzResult<HashSet<String>> {
        let roles = self.store.roles_for_user(user_id).await?;
        if roles.is_empty() {
            return Ok(HashSet::new());
        }

        let role_ids: Vec<RoleId> = roles.iter().map(|r| r.id).collect();
        let permissions = self.store.permissions_for_roles(&role_ids).await?;

        Ok(permissions.iter().map(|p| p.key()).collect())
    }

    /// Names of the roles bound to the user
    pub async fn list_role_names(&self, user_id: UserId) -> AuthzResult<HashSet<String>> {
        let roles = self.store.roles_for_user(user_id).await?;
        Ok(roles.into_iter().map(|r| r.name).collect())
    }

    /// AND semantics: every required permission must be held
    pub async fn has_all(&self, user_id: UserId, required: &[&str]) -> AuthzResult<bool> {
        let held = self.list_permissions(user_id).await?;
        Ok(required.iter().all(|r| held.contains(*r)))
    }

    /// OR semantics: holding any one of the required roles is sufficient
    pub async fn has_any_role(&self, user_id: UserId, required: &[&str]) -> AuthzResult<bool> {
        let held = self.list_role_names(user_id).await?;
        Ok(required.iter().any(|r| held.contains(*r)))
    }
}
