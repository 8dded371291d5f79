//! RBAC Data Model

use authz_common::{OrganizationId, PermissionId, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleKind {
    /// Process-wide role, not owned by any organization
    System,
    /// Role owned by a single organization
    Organization,
}

/// Named bundle of permissions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Unique role id
    pub id: RoleId,
    /// Owning organization; `None` for system roles
    pub organization_id: Option<OrganizationId>,
    /// Name, unique within the owning organization (global for system roles)
    pub name: String,
    /// Display name
    pub display_name: String,
    /// Display description
    pub description: Option<String>,
    /// Role scope
    pub kind: RoleKind,
    /// Marks the role auto-provisioned at onboarding
    pub is_default: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Role {
    /// Create an organization-scoped role
    pub fn new(
        organization_id: OrganizationId,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: Some(organization_id),
            name: name.into(),
            display_name: display_name.into(),
            description: None,
            kind: RoleKind::Organization,
            is_default: false,
            created_at: Utc::now(),
        }
    }

    /// Create a system-scoped role
    pub fn system(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id: None,
            name: name.into(),
            display_name: display_name.into(),
            description: None,
            kind: RoleKind::System,
            is_default: false,
            created_at: Utc::now(),
        }
    }

    /// The "admin" role auto-provisioned when an organization onboards
    pub fn admin(organization_id: OrganizationId) -> Self {
        let mut role = Self::new(organization_id, "admin", "Administrator");
        role.is_default = true;
        role
    }
}

/// A `resource:action` capability in the global catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    /// Unique permission id
    pub id: PermissionId,
    /// Resource half of the key, e.g. "projects"
    pub resource: String,
    /// Action half of the key, e.g. "read"
    pub action: String,
    /// Display description
    pub description: Option<String>,
}

impl Permission {
    /// Create a permission
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource: resource.into(),
            action: action.into(),
            description: None,
        }
    }

    /// The `resource:action` string used in permission checks
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }
}

/// Binding of a permission to a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePermission {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
}

/// Binding of a role to a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: UserId,
    pub role_id: RoleId,
    /// Who granted the role, when known
    pub granted_by: Option<UserId>,
    pub granted_at: DateTime<Utc>,
}
