//! Subscription Lifecycle

use std::fmt;
use std::sync::Arc;

use authz_common::{AuthzError, AuthzResult, OrganizationId, PlanId, SubscriptionId};
use authz_catalog::store::CatalogStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::license::LicenseKey;
use crate::org::OrganizationStatus;
use crate::store::BillingStore;

/// Stored state of a subscription. `Expired` is usually produced
/// lazily by [`Subscription::effective_status`] rather than written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Expired,
    Suspended,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Trialing => write!(f, "trialing"),
            Self::PastDue => write!(f, "past_due"),
            Self::Canceled => write!(f, "canceled"),
            Self::Expired => write!(f, "expired"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

/// An organization's subscription to a catalog plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub organization_id: OrganizationId,
    pub plan_id: PlanId,
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    /// Status as of `now`: once a hard `expires_at` has passed the
    /// subscription reads as `Expired` from any stored state, without
    /// being rewritten.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match self.expires_at {
            Some(at) if at <= now => SubscriptionStatus::Expired,
            _ => self.status,
        }
    }

    /// True while the effective status grants service
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.effective_status(now),
            SubscriptionStatus::Active | SubscriptionStatus::Trialing
        )
    }
}

/// Subscription lifecycle manager
///
/// Creates and cancels subscriptions against the billing store. A new
/// subscription is persisted together with its license key and the
/// organization's mirrored status in one atomic store call, so a
/// concurrent duplicate either sees the conflict or loses the race,
/// never both records.
pub struct SubscriptionLifecycle {
    store: Arc<dyn BillingStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl SubscriptionLifecycle {
    /// Create a lifecycle manager over the billing and catalog stores
    pub fn new(store: Arc<dyn BillingStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { store, catalog }
    }

    /// Subscribe an organization to a plan
    ///
    /// Plans with `trial_days > 0` start in `Trialing` with
    /// `trial_ends_at` set; all others start in `Active`. Fails with
    /// `Conflict` if the organization already has a live subscription.
    pub async fn create(
        &self,
        organization_id: OrganizationId,
        plan_id: PlanId,
        auto_renew: bool,
    ) -> AuthzResult<Subscription> {
        self.store
            .organization(organization_id)
            .await?
            .ok_or_else(|| {
                AuthzError::NotFound(format!("organization {} not found", organization_id))
            })?;
        let plan = self
            .catalog
            .plan(plan_id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("plan {} not found", plan_id)))?;

        let now = Utc::now();
        let (status, trial_ends_at) = if plan.trial_days > 0 {
            let ends = now + chrono::Duration::days(plan.trial_days as i64);
            (SubscriptionStatus::Trialing, Some(ends))
        } else {
            (SubscriptionStatus::Active, None)
        };

        let subscription = Subscription {
            id: Uuid::new_v4(),
            organization_id,
            plan_id,
            status,
            started_at: now,
            current_period_start: now,
            current_period_end: plan.billing_period.period_end(now),
            trial_ends_at,
            canceled_at: None,
            expires_at: None,
            auto_renew,
            created_at: now,
        };

        let key = LicenseKey::generate(organization_id, subscription.id);
        let org_status = match status {
            SubscriptionStatus::Trialing => OrganizationStatus::Trial,
            _ => OrganizationStatus::Active,
        };

        self.store
            .create_subscription(subscription.clone(), key, org_status)
            .await?;

        tracing::info!(
            "Subscription created: {} (org {}, plan {})",
            subscription.id,
            organization_id,
            plan.slug
        );
        Ok(subscription)
    }

    /// Cancel a subscription immediately
    ///
    /// Canceling is terminal and idempotence is rejected: a second
    /// cancel fails with `BadRequest`. The license key is left in
    /// place; validation rejects it through the subscription status.
    pub async fn cancel(&self, id: SubscriptionId) -> AuthzResult<Subscription> {
        let mut subscription = self
            .store
            .subscription(id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("subscription {} not found", id)))?;

        if subscription.status == SubscriptionStatus::Canceled {
            return Err(AuthzError::BadRequest(
                "subscription already canceled".into(),
            ));
        }

        subscription.status = SubscriptionStatus::Canceled;
        subscription.canceled_at = Some(Utc::now());
        subscription.auto_renew = false;
        self.store.update_subscription(subscription.clone()).await?;

        tracing::info!("Subscription canceled: {}", id);
        Ok(subscription)
    }

    /// Fetch a subscription by id
    pub async fn subscription(&self, id: SubscriptionId) -> AuthzResult<Subscription> {
        self.store
            .subscription(id)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("subscription {} not found", id)))
    }

    /// The organization's subscription with effective status `Active`,
    /// if any. Trialing subscriptions are deliberately excluded: plan
    /// entitlements switch on only once a subscription is active.
    pub async fn active_subscription(
        &self,
        organization_id: OrganizationId,
    ) -> AuthzResult<Option<Subscription>> {
        let now = Utc::now();
        let subs = self
            .store
            .subscriptions_for_organization(organization_id)
            .await?;
        Ok(subs
            .into_iter()
            .find(|s| s.effective_status(now) == SubscriptionStatus::Active))
    }

    /// All subscriptions ever created for an organization, any status
    pub async fn list_for_organization(
        &self,
        organization_id: OrganizationId,
    ) -> AuthzResult<Vec<Subscription>> {
        self.store.subscriptions_for_organization(organization_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::org::Organization;
    use crate::store::InMemoryBillingStore;
    use authz_catalog::model::{BillingPeriod, PlanType, SubscriptionPlan};
    use authz_catalog::store::InMemoryCatalogStore;
    use rust_decimal_macros::dec;

    async fn setup() -> (SubscriptionLifecycle, Arc<InMemoryBillingStore>, Organization) {
        let store = Arc::new(InMemoryBillingStore::new());
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let org = Organization::new("Acme Corp").unwrap();
        store.register_organization(org.clone()).await.unwrap();
        let lifecycle = SubscriptionLifecycle::new(store.clone(), catalog.clone());
        (lifecycle, store, org)
    }

    async fn seed_plan(
        lifecycle: &SubscriptionLifecycle,
        name: &str,
        trial_days: u32,
    ) -> SubscriptionPlan {
        let mut plan = SubscriptionPlan::new(
            name,
            PlanType::Basic,
            BillingPeriod::Monthly,
            dec!(29),
        )
        .unwrap();
        plan.trial_days = trial_days;
        lifecycle.catalog.create_plan(plan.clone()).await.unwrap();
        plan
    }

    #[tokio::test]
    async fn test_create_active_subscription() {
        let (lifecycle, store, org) = setup().await;
        let plan = seed_plan(&lifecycle, "Basic", 0).await;

        let sub = lifecycle.create(org.id, plan.id, true).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.trial_ends_at.is_none());
        assert!(sub.current_period_end > sub.current_period_start);

        let stored = store.organization(org.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrganizationStatus::Active);
    }

    #[tokio::test]
    async fn test_create_trialing_subscription() {
        let (lifecycle, store, org) = setup().await;
        let plan = seed_plan(&lifecycle, "Pro Trial", 14).await;

        let sub = lifecycle.create(org.id, plan.id, false).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert!(sub.trial_ends_at.is_some());

        let stored = store.organization(org.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrganizationStatus::Trial);
    }

    #[tokio::test]
    async fn test_create_issues_license_key() {
        let (lifecycle, store, org) = setup().await;
        let plan = seed_plan(&lifecycle, "Basic", 0).await;

        let sub = lifecycle.create(org.id, plan.id, true).await.unwrap();
        let key = store.license_for_subscription(sub.id).await.unwrap();
        assert!(key.is_some());
        assert!(key.unwrap().key.starts_with("LIC-"));
    }

    #[tokio::test]
    async fn test_second_live_subscription_conflicts() {
        let (lifecycle, _store, org) = setup().await;
        let plan = seed_plan(&lifecycle, "Basic", 0).await;

        lifecycle.create(org.id, plan.id, true).await.unwrap();
        let err = lifecycle.create(org.id, plan.id, true).await.unwrap_err();
        assert!(matches!(err, AuthzError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_cancel_then_resubscribe() {
        let (lifecycle, _store, org) = setup().await;
        let plan = seed_plan(&lifecycle, "Basic", 0).await;

        let first = lifecycle.create(org.id, plan.id, true).await.unwrap();
        let canceled = lifecycle.cancel(first.id).await.unwrap();
        assert_eq!(canceled.status, SubscriptionStatus::Canceled);
        assert!(canceled.canceled_at.is_some());
        assert!(!canceled.auto_renew);

        let second = lifecycle.create(org.id, plan.id, true).await.unwrap();
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    async fn test_concurrent_create_single_winner() {
        let (lifecycle, _store, org) = setup().await;
        let plan = seed_plan(&lifecycle, "Basic", 0).await;

        let (a, b) = tokio::join!(
            lifecycle.create(org.id, plan.id, true),
            lifecycle.create(org.id, plan.id, true)
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let loser = a.err().or(b.err()).unwrap();
        assert!(matches!(loser, AuthzError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_cancel_twice_rejected() {
        let (lifecycle, _store, org) = setup().await;
        let plan = seed_plan(&lifecycle, "Basic", 0).await;

        let sub = lifecycle.create(org.id, plan.id, true).await.unwrap();
        lifecycle.cancel(sub.id).await.unwrap();
        let err = lifecycle.cancel(sub.id).await.unwrap_err();
        assert!(matches!(err, AuthzError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_cancel_unknown_subscription() {
        let (lifecycle, _store, _org) = setup().await;
        let err = lifecycle.cancel(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthzError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_unknown_plan() {
        let (lifecycle, _store, org) = setup().await;
        let err = lifecycle.create(org.id, Uuid::new_v4(), true).await.unwrap_err();
        assert!(matches!(err, AuthzError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_unknown_organization() {
        let (lifecycle, _store, _org) = setup().await;
        let plan = seed_plan(&lifecycle, "Basic", 0).await;
        let err = lifecycle
            .create(Uuid::new_v4(), plan.id, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_expired_subscription_not_active() {
        let (lifecycle, store, org) = setup().await;
        let plan = seed_plan(&lifecycle, "Basic", 0).await;

        let mut sub = lifecycle.create(org.id, plan.id, true).await.unwrap();
        sub.expires_at = Some(Utc::now() - chrono::Duration::days(1));
        store.update_subscription(sub.clone()).await.unwrap();

        assert_eq!(
            sub.effective_status(Utc::now()),
            SubscriptionStatus::Expired
        );
        let active = lifecycle.active_subscription(org.id).await.unwrap();
        assert!(active.is_none());

        // A lapsed subscription no longer blocks a new one.
        lifecycle.create(org.id, plan.id, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_trialing_excluded_from_active() {
        let (lifecycle, _store, org) = setup().await;
        let plan = seed_plan(&lifecycle, "Pro Trial", 14).await;

        lifecycle.create(org.id, plan.id, false).await.unwrap();
        let active = lifecycle.active_subscription(org.id).await.unwrap();
        assert!(active.is_none());
    }
}
