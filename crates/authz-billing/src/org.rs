//! Organization directory records.

use authz_common::{DomainError, OrganizationId, Slug};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an organization account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganizationStatus {
    /// Account in good standing.
    Active,
    /// Access administratively suspended.
    Suspended,
    /// No live subscription and never trialed, or wound down.
    Inactive,
    /// Currently in a trial period.
    Trial,
}

/// A customer organization. Users, roles, subscriptions and license
/// keys all hang off an organization id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    /// Unique organization identifier.
    pub id: OrganizationId,
    /// Human-readable company name.
    pub name: String,
    /// URL-safe handle derived from the name.
    pub slug: String,
    /// Current account status.
    pub status: OrganizationStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization with a slug derived from `name`.
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        let slug = Slug::derive(&name)?;
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            slug: slug.as_str().to_string(),
            status: OrganizationStatus::Active,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_new() {
        let org = Organization::new("Acme Corp").unwrap();
        assert_eq!(org.slug, "acme-corp");
        assert_eq!(org.status, OrganizationStatus::Active);
    }

    #[test]
    fn test_organization_bad_name() {
        assert!(Organization::new("!!!").is_err());
    }
}
