//! # OpenAuthz Engine
//!
//! The wired platform: one construction point for permission
//! resolution, entitlement resolution, usage metering, subscription
//! lifecycle and license validation, sharing a common set of storage
//! seams.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       AUTHZ ENGINE                        │
//! │                                                           │
//! │   ┌────────────┐  ┌─────────────┐  ┌──────────────────┐  │
//! │   │ Permission │  │ Entitlement │  │   License Key    │  │
//! │   │  Resolver  │  │  Resolver   │  │    Validator     │  │
//! │   └─────┬──────┘  └──────┬──────┘  └────────┬─────────┘  │
//! │         │                │                  │            │
//! │   ┌─────┴──────┐  ┌──────┴──────┐  ┌────────┴─────────┐  │
//! │   │    Role    │  │    Usage    │  │   Subscription   │  │
//! │   │  Bindings  │  │   Tracker   │  │    Lifecycle     │  │
//! │   └────────────┘  └─────────────┘  └──────────────────┘  │
//! │                                                           │
//! │         catalog ─ billing ─ usage ─ override stores       │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! A guard layer in front of protected operations calls
//! [`PermissionResolver::has_all`] and/or
//! [`EntitlementResolver::assert_access`] before running a handler;
//! the handler then reports consumption through
//! [`AuthzEngine::record_usage`]. Identity (`user_id`,
//! `organization_id`) is always passed explicitly, never ambient.

#![warn(missing_docs)]

use std::sync::Arc;

use authz_billing::license::LicenseKeyValidator;
use authz_billing::org::Organization;
use authz_billing::store::{BillingStore, InMemoryBillingStore};
use authz_billing::subscriptions::SubscriptionLifecycle;
use authz_catalog::store::{CatalogStore, InMemoryCatalogStore};
use authz_common::{OrganizationId, UserId};
use authz_entitlement::resolver::{EntitlementResolver, InMemoryOverrideStore, OverrideStore};
use authz_entitlement::usage::{InMemoryUsageStore, UsageStore, UsageTracker};
use authz_rbac::model::Role;
use authz_rbac::resolver::PermissionResolver;
use authz_rbac::store::{InMemoryRoleBindingStore, RoleBindingStore};

pub use authz_common::{AuthzError, AuthzResult};

/// Authorization and entitlement platform
pub struct AuthzEngine {
    /// Permission resolution over role bindings
    pub permissions: Arc<PermissionResolver>,
    /// Feature entitlement resolution
    pub entitlements: Arc<EntitlementResolver>,
    /// Usage metering
    pub usage: Arc<UsageTracker>,
    /// Subscription lifecycle
    pub subscriptions: Arc<SubscriptionLifecycle>,
    /// License key issuance and validation
    pub licenses: Arc<LicenseKeyValidator>,
    /// Plan and feature catalog storage
    pub catalog: Arc<dyn CatalogStore>,
    /// Role binding storage
    pub bindings: Arc<dyn RoleBindingStore>,
    /// Billing storage
    pub billing: Arc<dyn BillingStore>,
}

impl AuthzEngine {
    /// Wire an engine over the given storage seams
    pub fn new(
        bindings: Arc<dyn RoleBindingStore>,
        catalog: Arc<dyn CatalogStore>,
        billing: Arc<dyn BillingStore>,
        overrides: Arc<dyn OverrideStore>,
        usage_store: Arc<dyn UsageStore>,
    ) -> Self {
        let usage = Arc::new(UsageTracker::new(usage_store));
        let subscriptions = Arc::new(SubscriptionLifecycle::new(
            billing.clone(),
            catalog.clone(),
        ));
        let entitlements = Arc::new(EntitlementResolver::new(
            catalog.clone(),
            subscriptions.clone(),
            overrides,
            usage.clone(),
        ));
        let licenses = Arc::new(LicenseKeyValidator::new(billing.clone(), catalog.clone()));

        Self {
            permissions: Arc::new(PermissionResolver::new(bindings.clone())),
            entitlements,
            usage,
            subscriptions,
            licenses,
            catalog,
            bindings,
            billing,
        }
    }

    /// Engine backed entirely by in-memory stores
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryRoleBindingStore::new()),
            Arc::new(InMemoryCatalogStore::new()),
            Arc::new(InMemoryBillingStore::new()),
            Arc::new(InMemoryOverrideStore::new()),
            Arc::new(InMemoryUsageStore::new()),
        )
    }

    /// Register an organization and auto-provision its admin role
    pub async fn onboard_organization(
        &self,
        name: impl Into<String>,
    ) -> AuthzResult<(Organization, Role)> {
        let org = Organization::new(name)?;
        self.billing.register_organization(org.clone()).await?;
        let admin = self.bindings.create_role(Role::admin(org.id)).await?;
        tracing::info!("Organization onboarded: {} ({})", org.slug, org.id);
        Ok((org, admin))
    }

    /// Record feature consumption by code after a gated operation
    /// succeeds
    pub async fn record_usage(
        &self,
        organization_id: OrganizationId,
        feature_code: &str,
        amount: u64,
        user_id: Option<UserId>,
    ) -> AuthzResult<()> {
        let feature = self
            .catalog
            .feature_by_code(feature_code)
            .await?
            .ok_or_else(|| {
                AuthzError::NotFound(format!("feature '{}' not found", feature_code))
            })?;
        self.usage
            .record_usage(organization_id, feature.id, amount, user_id)
            .await
    }
}

impl Default for AuthzEngine {
    fn default() -> Self {
        Self::in_memory()
    }
}
