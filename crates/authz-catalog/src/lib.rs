//! OpenAuthz Catalog - Process-wide reference data
//!
//! Holds the records every organization resolves against: the feature
//! catalog, the subscription plan catalog, and the per-plan feature grants.
//! Catalog data is read-heavy and administratively written; uniqueness of
//! feature codes, plan slugs, and (plan, feature) pairs is enforced by the
//! store, not by callers.

#![warn(missing_docs)]

pub mod model;
pub mod store;

pub use model::{
    BillingPeriod, Feature, FeatureKind, PlanFeature, PlanLimits, PlanType, SubscriptionPlan,
};
pub use store::{CatalogStore, InMemoryCatalogStore};
