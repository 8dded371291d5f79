//! Entitlement records and resolution results.

use authz_common::{FeatureId, OrganizationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-organization entitlement override, unique per
/// `(organization, feature)`. Presence alone decides resolution: an
/// effective override grants, any other override denies absolutely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureOverride {
    /// Organization the override applies to.
    pub organization_id: OrganizationId,
    /// Feature being overridden.
    pub feature_id: FeatureId,
    /// Value interpreted per the feature's kind.
    pub value: Option<String>,
    /// Disabled overrides deny even when the plan grants.
    pub is_enabled: bool,
    /// Expired overrides deny in the same way.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation or last-update time.
    pub created_at: DateTime<Utc>,
}

impl FeatureOverride {
    /// An enabled override with no expiry.
    pub fn grant(
        organization_id: OrganizationId,
        feature_id: FeatureId,
        value: Option<String>,
    ) -> Self {
        Self {
            organization_id,
            feature_id,
            value,
            is_enabled: true,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// A disabled override: an explicit, absolute revoke.
    pub fn deny(organization_id: OrganizationId, feature_id: FeatureId) -> Self {
        Self {
            organization_id,
            feature_id,
            value: None,
            is_enabled: false,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    /// Enabled and not yet expired as of `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_enabled && self.expires_at.map_or(true, |at| at > now)
    }
}

/// One period's usage counter for `(organization, feature)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Organization the usage belongs to.
    pub organization_id: OrganizationId,
    /// Feature being metered.
    pub feature_id: FeatureId,
    /// First instant of the billing window.
    pub period_start: DateTime<Utc>,
    /// Last instant of the billing window.
    pub period_end: DateTime<Utc>,
    /// Monotonic counter, reset only by a new period starting at 0.
    pub usage_count: u64,
}

/// Outcome of resolving one `(organization, feature)` pair. A normal
/// "not entitled" is expressed here, not as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureAccess {
    /// Whether the organization may use the feature right now.
    pub has_access: bool,
    /// Granted value, interpreted per the feature's kind.
    pub value: Option<String>,
    /// Allowance left this period, for metered kinds only.
    pub remaining: Option<u64>,
}

impl FeatureAccess {
    /// Access granted at `value`, no metering involved.
    pub fn granted(value: Option<String>) -> Self {
        Self {
            has_access: true,
            value,
            remaining: None,
        }
    }

    /// No access, no value.
    pub fn denied() -> Self {
        Self {
            has_access: false,
            value: None,
            remaining: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn test_override_effective() {
        let ov = FeatureOverride::grant(Uuid::new_v4(), Uuid::new_v4(), Some("true".into()));
        assert!(ov.is_effective(Utc::now()));
    }

    #[test]
    fn test_disabled_override_not_effective() {
        let ov = FeatureOverride::deny(Uuid::new_v4(), Uuid::new_v4());
        assert!(!ov.is_effective(Utc::now()));
    }

    #[test]
    fn test_expired_override_not_effective() {
        let mut ov = FeatureOverride::grant(Uuid::new_v4(), Uuid::new_v4(), None);
        ov.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(!ov.is_effective(Utc::now()));
    }
}
