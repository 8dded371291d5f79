//! Billing persistence seam and in-memory backend
//!
//! Organizations, subscriptions and license keys live behind one store
//! trait so `create_subscription` can commit a subscription, its key
//! and the organization's mirrored status as a single critical
//! section. The in-memory backend keeps all three maps under one lock
//! for exactly that reason.

use std::collections::HashMap;

use async_trait::async_trait;
use authz_common::{AuthzError, AuthzResult, OrganizationId, SubscriptionId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::license::LicenseKey;
use crate::org::{Organization, OrganizationStatus};
use crate::subscriptions::Subscription;

/// Storage seam for billing state
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Insert a new organization; slugs are unique
    async fn register_organization(&self, org: Organization) -> AuthzResult<()>;

    /// Fetch an organization by id
    async fn organization(&self, id: OrganizationId) -> AuthzResult<Option<Organization>>;

    /// Fetch an organization by slug
    async fn organization_by_slug(&self, slug: &str) -> AuthzResult<Option<Organization>>;

    /// Atomically insert a subscription with its license key and move
    /// the organization to `org_status`. Fails with `Conflict` if the
    /// organization already has a live subscription; on any failure
    /// nothing is written.
    async fn create_subscription(
        &self,
        subscription: Subscription,
        key: LicenseKey,
        org_status: OrganizationStatus,
    ) -> AuthzResult<()>;

    /// Fetch a subscription by id
    async fn subscription(&self, id: SubscriptionId) -> AuthzResult<Option<Subscription>>;

    /// All subscriptions for an organization, any status
    async fn subscriptions_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> AuthzResult<Vec<Subscription>>;

    /// Replace a stored subscription
    async fn update_subscription(&self, subscription: Subscription) -> AuthzResult<()>;

    /// Insert an additional license key
    async fn insert_license_key(&self, key: LicenseKey) -> AuthzResult<()>;

    /// Fetch a license key by its string form
    async fn license_key(&self, key: &str) -> AuthzResult<Option<LicenseKey>>;

    /// The most recently issued key for a subscription
    async fn license_for_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> AuthzResult<Option<LicenseKey>>;

    /// Replace a stored license key
    async fn update_license_key(&self, key: LicenseKey) -> AuthzResult<()>;

    /// Record a successful validation time on a key
    async fn touch_license_validated(&self, id: Uuid, at: DateTime<Utc>) -> AuthzResult<()>;
}

#[derive(Default)]
struct BillingState {
    organizations: HashMap<OrganizationId, Organization>,
    organization_slugs: HashMap<String, OrganizationId>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    license_keys: HashMap<String, LicenseKey>,
    subscription_keys: HashMap<SubscriptionId, String>,
}

/// In-memory billing store
pub struct InMemoryBillingStore {
    inner: RwLock<BillingState>,
}

impl InMemoryBillingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BillingState::default()),
        }
    }
}

impl Default for InMemoryBillingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn register_organization(&self, org: Organization) -> AuthzResult<()> {
        let mut state = self.inner.write();
        if state.organization_slugs.contains_key(&org.slug) {
            return Err(AuthzError::Conflict(format!(
                "organization slug '{}' already exists",
                org.slug
            )));
        }
        state.organization_slugs.insert(org.slug.clone(), org.id);
        state.organizations.insert(org.id, org);
        Ok(())
    }

    async fn organization(&self, id: OrganizationId) -> AuthzResult<Option<Organization>> {
        Ok(self.inner.read().organizations.get(&id).cloned())
    }

    async fn organization_by_slug(&self, slug: &str) -> AuthzResult<Option<Organization>> {
        let state = self.inner.read();
        Ok(state
            .organization_slugs
            .get(slug)
            .and_then(|id| state.organizations.get(id))
            .cloned())
    }

    async fn create_subscription(
        &self,
        subscription: Subscription,
        key: LicenseKey,
        org_status: OrganizationStatus,
    ) -> AuthzResult<()> {
        let now = Utc::now();
        let mut state = self.inner.write();

        if !state.organizations.contains_key(&subscription.organization_id) {
            return Err(AuthzError::NotFound(format!(
                "organization {} not found",
                subscription.organization_id
            )));
        }
        let live = state
            .subscriptions
            .values()
            .any(|s| s.organization_id == subscription.organization_id && s.is_live(now));
        if live {
            return Err(AuthzError::Conflict(format!(
                "organization {} already has a live subscription",
                subscription.organization_id
            )));
        }

        state
            .subscription_keys
            .insert(key.subscription_id, key.key.clone());
        state.license_keys.insert(key.key.clone(), key);
        if let Some(org) = state.organizations.get_mut(&subscription.organization_id) {
            org.status = org_status;
        }
        state.subscriptions.insert(subscription.id, subscription);
        Ok(())
    }

    async fn subscription(&self, id: SubscriptionId) -> AuthzResult<Option<Subscription>> {
        Ok(self.inner.read().subscriptions.get(&id).cloned())
    }

    async fn subscriptions_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> AuthzResult<Vec<Subscription>> {
        Ok(self
            .inner
            .read()
            .subscriptions
            .values()
            .filter(|s| s.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn update_subscription(&self, subscription: Subscription) -> AuthzResult<()> {
        let mut state = self.inner.write();
        if !state.subscriptions.contains_key(&subscription.id) {
            return Err(AuthzError::NotFound(format!(
                "subscription {} not found",
                subscription.id
            )));
        }
        state.subscriptions.insert(subscription.id, subscription);
        Ok(())
    }

    async fn insert_license_key(&self, key: LicenseKey) -> AuthzResult<()> {
        let mut state = self.inner.write();
        if state.license_keys.contains_key(&key.key) {
            return Err(AuthzError::Conflict(format!(
                "license key '{}' already exists",
                key.key
            )));
        }
        state
            .subscription_keys
            .insert(key.subscription_id, key.key.clone());
        state.license_keys.insert(key.key.clone(), key);
        Ok(())
    }

    async fn license_key(&self, key: &str) -> AuthzResult<Option<LicenseKey>> {
        Ok(self.inner.read().license_keys.get(key).cloned())
    }

    async fn license_for_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> AuthzResult<Option<LicenseKey>> {
        let state = self.inner.read();
        Ok(state
            .subscription_keys
            .get(&subscription_id)
            .and_then(|k| state.license_keys.get(k))
            .cloned())
    }

    async fn update_license_key(&self, key: LicenseKey) -> AuthzResult<()> {
        let mut state = self.inner.write();
        if !state.license_keys.contains_key(&key.key) {
            return Err(AuthzError::NotFound(format!(
                "license key '{}' not found",
                key.key
            )));
        }
        state.license_keys.insert(key.key.clone(), key);
        Ok(())
    }

    async fn touch_license_validated(&self, id: Uuid, at: DateTime<Utc>) -> AuthzResult<()> {
        let mut state = self.inner.write();
        match state.license_keys.values_mut().find(|k| k.id == id) {
            Some(key) => {
                key.last_validated_at = Some(at);
                Ok(())
            }
            None => Err(AuthzError::NotFound(format!(
                "license key {} not found",
                id
            ))),
        }
    }
}
