//! # OpenAuthz Billing
//!
//! Subscription lifecycle and license key management for the OpenAuthz
//! platform. Organizations subscribe to a plan from the catalog; each
//! live subscription carries exactly one license key that customer
//! deployments present for validation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       BILLING ENGINE                         │
//! │                                                              │
//! │  ┌──────────────┐   ┌────────────────┐   ┌───────────────┐  │
//! │  │ Organization │──▶│  Subscription  │──▶│  License Key  │  │
//! │  │  Directory   │   │   Lifecycle    │   │   Validator   │  │
//! │  └──────────────┘   └────────────────┘   └───────────────┘  │
//! │         │                   │                    │          │
//! │         └───────────────────┼────────────────────┘          │
//! │                             ▼                               │
//! │                     ┌───────────────┐                       │
//! │                     │ Billing Store │                       │
//! │                     └───────────────┘                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A subscription is live while its effective status is `Active` or
//! `Trialing`; at most one live subscription exists per organization,
//! enforced atomically by the store. Expiration is evaluated lazily at
//! read time so no background sweeper is required.

#![warn(missing_docs)]

pub mod org;
pub mod subscriptions;
pub mod license;
pub mod store;

pub use org::{Organization, OrganizationStatus};
pub use subscriptions::{Subscription, SubscriptionLifecycle, SubscriptionStatus};
pub use license::{LicenseKey, LicenseKeyValidator, ValidationResult};
pub use store::{BillingStore, InMemoryBillingStore};
