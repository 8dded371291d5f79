//! Catalog Data Model

use authz_common::{DomainError, FeatureCode, FeatureId, PlanId, Slug};
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Feature kind, deciding how a plan value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    /// On/off capability; value is "true"/"false"
    Boolean,
    /// Numeric ceiling checked against period usage
    Limit,
    /// Consumable allowance checked against period usage
    Quota,
    /// Rollout flag; value is "true"/"false"
    Flag,
}

impl FeatureKind {
    /// Whether resolution compares the plan value against period usage
    pub fn is_metered(&self) -> bool {
        matches!(self, Self::Limit | Self::Quota)
    }
}

/// A named capability organizations can be entitled to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    /// Unique feature id
    pub id: FeatureId,
    /// Unique feature code, e.g. "api_access"
    pub code: String,
    /// Display name
    pub name: String,
    /// Display description
    pub description: Option<String>,
    /// How plan values for this feature are interpreted
    pub kind: FeatureKind,
    /// Value assumed when a plan grants the feature without one
    pub default_value: Option<String>,
    /// Unit for metered kinds, e.g. "requests"
    pub unit: Option<String>,
    /// Inactive features resolve as unknown
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Feature {
    /// Create an active feature
    pub fn new(code: FeatureCode, name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.as_str().to_string(),
            name: name.into(),
            description: None,
            kind,
            default_value: None,
            unit: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanType {
    Free,
    Trial,
    Basic,
    Professional,
    Enterprise,
    Custom,
}

/// Recurring billing window length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingPeriod {
    Monthly,
    Quarterly,
    Yearly,
    Lifetime,
}

impl BillingPeriod {
    /// Period end by calendar arithmetic from a start instant
    ///
    /// Monthly, quarterly, and yearly add calendar months (chrono clamps
    /// day-of-month at month end); lifetime adds 100 years as a practical
    /// "never".
    pub fn period_end(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Yearly => 12,
            Self::Lifetime => 1200,
        };
        start + Months::new(months)
    }
}

/// Informational ceilings carried by a plan, distinct from feature quotas
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_users: Option<u32>,
    pub max_projects: Option<u32>,
    pub max_storage_mb: Option<u64>,
}

/// Subscription plan catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    /// Unique plan id
    pub id: PlanId,
    /// Display name
    pub name: String,
    /// Unique slug derived from the name
    pub slug: String,
    /// Display description
    pub description: Option<String>,
    /// Plan tier
    pub plan_type: PlanType,
    /// Billing window length
    pub billing_period: BillingPeriod,
    /// Price per billing period
    pub price: Decimal,
    /// Trial length in days; 0 means no trial
    pub trial_days: u32,
    /// Informational ceilings
    pub limits: PlanLimits,
    /// Inactive plans are hidden from listings
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    /// Create an active plan, deriving the slug from the name
    pub fn new(
        name: impl Into<String>,
        plan_type: PlanType,
        billing_period: BillingPeriod,
        price: Decimal,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        let slug = Slug::derive(&name)?;

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            slug: slug.as_str().to_string(),
            description: None,
            plan_type,
            billing_period,
            price,
            trial_days: 0,
            limits: PlanLimits::default(),
            is_active: true,
            created_at: Utc::now(),
        })
    }
}

/// Grant of a feature by a plan
///
/// `value` is a string interpreted per the feature's kind: numeric ceiling
/// for limit/quota, "true"/"false" for boolean/flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFeature {
    pub plan_id: PlanId,
    pub feature_id: FeatureId,
    pub value: Option<String>,
    pub is_enabled: bool,
}

impl PlanFeature {
    /// Enabled grant with a value
    pub fn enabled(plan_id: PlanId, feature_id: FeatureId, value: impl Into<String>) -> Self {
        Self {
            plan_id,
            feature_id,
            value: Some(value.into()),
            is_enabled: true,
        }
    }

    /// Disabled grant, shadowing any earlier one
    pub fn disabled(plan_id: PlanId, feature_id: FeatureId) -> Self {
        Self {
            plan_id,
            feature_id,
            value: None,
            is_enabled: false,
        }
    }
}
