//! # OpenAuthz Entitlements
//!
//! Feature access resolution and usage metering. Answers one question:
//! may this organization use this feature right now, and at what value
//! or remaining allowance?
//!
//! Resolution precedence for `(organization, feature)`:
//!
//! 1. A per-organization override, when present, wins outright. An
//!    enabled and unexpired override grants; a disabled or expired one
//!    denies and suppresses any plan fallback.
//! 2. Otherwise the organization's active subscription supplies the
//!    plan grant for the feature. No active subscription means no
//!    access.
//! 3. Metered kinds (`Limit`, `Quota`) additionally compare the
//!    current billing period's usage counter against the granted
//!    ceiling.
//!
//! Usage counters are monotonic within a calendar-month window and are
//! incremented through an atomic upsert so concurrent recordings never
//! lose an update.

#![warn(missing_docs)]

pub mod model;
pub mod resolver;
pub mod usage;

pub use model::{FeatureAccess, FeatureOverride, UsageRecord};
pub use resolver::{EntitlementResolver, InMemoryOverrideStore, OverrideStore};
pub use usage::{BillingWindow, InMemoryUsageStore, UsageStore, UsageTracker};
