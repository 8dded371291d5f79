//! License Key Generation and Validation

use std::fmt;
use std::sync::Arc;

use authz_common::{AuthzError, AuthzResult, OrganizationId, PlanId, SubscriptionId};
use authz_catalog::model::PlanType;
use authz_catalog::store::CatalogStore;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::BillingStore;
use crate::subscriptions::SubscriptionStatus;

/// Generate an opaque license key string: `LIC-` followed by 32
/// uppercase hex characters from the OS entropy source.
pub fn generate_key() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    format!("LIC-{}", hex::encode_upper(bytes))
}

/// Stored state of a license key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseKeyStatus {
    Active,
    Suspended,
    Revoked,
    Expired,
}

impl fmt::Display for LicenseKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
            Self::Revoked => write!(f, "revoked"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// A license key bound to one subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseKey {
    pub id: Uuid,
    pub key: String,
    pub organization_id: OrganizationId,
    pub subscription_id: SubscriptionId,
    pub status: LicenseKeyStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub activation_count: u32,
    pub max_activations: Option<u32>,
}

impl LicenseKey {
    /// Issue a fresh active key for a subscription
    pub fn generate(organization_id: OrganizationId, subscription_id: SubscriptionId) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: generate_key(),
            organization_id,
            subscription_id,
            status: LicenseKeyStatus::Active,
            issued_at: Utc::now(),
            expires_at: None,
            last_validated_at: None,
            activation_count: 0,
            max_activations: None,
        }
    }
}

/// Organization fields echoed back to a validating deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationSummary {
    pub id: OrganizationId,
    pub name: String,
}

/// Plan fields echoed back to a validating deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub id: PlanId,
    pub name: String,
    pub plan_type: PlanType,
}

/// Subscription fields echoed back to a validating deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSummary {
    pub id: SubscriptionId,
    pub status: SubscriptionStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Successful validation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub organization: OrganizationSummary,
    pub plan: PlanSummary,
    pub subscription: SubscriptionSummary,
}

/// License key validator
///
/// Checks run in a fixed order and the first failure wins: key
/// existence, then key status, then key expiry, then the effective
/// status of the backing subscription.
pub struct LicenseKeyValidator {
    store: Arc<dyn BillingStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl LicenseKeyValidator {
    /// Create a validator over the billing and catalog stores
    pub fn new(store: Arc<dyn BillingStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { store, catalog }
    }

    /// Rotate the key for a subscription: issue a fresh key and revoke
    /// the previous one if present.
    pub async fn rotate(&self, subscription_id: SubscriptionId) -> AuthzResult<LicenseKey> {
        let subscription = self
            .store
            .subscription(subscription_id)
            .await?
            .ok_or_else(|| {
                AuthzError::NotFound(format!("subscription {} not found", subscription_id))
            })?;

        if let Some(mut old) = self.store.license_for_subscription(subscription_id).await? {
            if old.status == LicenseKeyStatus::Active {
                old.status = LicenseKeyStatus::Revoked;
                self.store.update_license_key(old).await?;
            }
        }

        let key = LicenseKey::generate(subscription.organization_id, subscription_id);
        self.store.insert_license_key(key.clone()).await?;
        tracing::info!("License key rotated for subscription {}", subscription_id);
        Ok(key)
    }

    /// Validate a presented key string
    ///
    /// On success the key's `last_validated_at` is touched best-effort;
    /// a failure to record it never fails the validation itself.
    pub async fn validate(&self, key: &str) -> AuthzResult<ValidationResult> {
        let record = self
            .store
            .license_key(key)
            .await?
            .ok_or_else(|| AuthzError::NotFound("license key not found".into()))?;

        match record.status {
            LicenseKeyStatus::Active => {}
            other => {
                return Err(AuthzError::BadRequest(format!("license key is {}", other)));
            }
        }

        let now = Utc::now();
        if let Some(at) = record.expires_at {
            if at <= now {
                return Err(AuthzError::BadRequest("license key is expired".into()));
            }
        }

        let subscription = self
            .store
            .subscription(record.subscription_id)
            .await?
            .ok_or_else(|| {
                AuthzError::NotFound(format!(
                    "subscription {} not found",
                    record.subscription_id
                ))
            })?;
        let status = subscription.effective_status(now);
        if !subscription.is_live(now) {
            return Err(AuthzError::BadRequest(format!("subscription is {}", status)));
        }

        let organization = self
            .store
            .organization(record.organization_id)
            .await?
            .ok_or_else(|| {
                AuthzError::NotFound(format!(
                    "organization {} not found",
                    record.organization_id
                ))
            })?;
        let plan = self
            .catalog
            .plan(subscription.plan_id)
            .await?
            .ok_or_else(|| {
                AuthzError::NotFound(format!("plan {} not found", subscription.plan_id))
            })?;

        if let Err(err) = self.store.touch_license_validated(record.id, now).await {
            tracing::debug!("Validation timestamp not recorded for {}: {}", record.key, err);
        }

        Ok(ValidationResult {
            valid: true,
            organization: OrganizationSummary {
                id: organization.id,
                name: organization.name,
            },
            plan: PlanSummary {
                id: plan.id,
                name: plan.name,
                plan_type: plan.plan_type,
            },
            subscription: SubscriptionSummary {
                id: subscription.id,
                status,
                expires_at: subscription.expires_at,
            },
        })
    }

    /// Revoke a key by its string form
    pub async fn revoke(&self, key: &str) -> AuthzResult<LicenseKey> {
        let mut record = self
            .store
            .license_key(key)
            .await?
            .ok_or_else(|| AuthzError::NotFound("license key not found".into()))?;

        if record.status == LicenseKeyStatus::Revoked {
            return Err(AuthzError::BadRequest("license key already revoked".into()));
        }

        record.status = LicenseKeyStatus::Revoked;
        self.store.update_license_key(record.clone()).await?;
        tracing::info!("License key revoked: {}", record.key);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::org::Organization;
    use crate::store::InMemoryBillingStore;
    use crate::subscriptions::{Subscription, SubscriptionLifecycle};
    use authz_catalog::model::{BillingPeriod, SubscriptionPlan};
    use authz_catalog::store::InMemoryCatalogStore;
    use rust_decimal_macros::dec;

    struct Fixture {
        validator: LicenseKeyValidator,
        lifecycle: SubscriptionLifecycle,
        store: Arc<InMemoryBillingStore>,
        subscription: Subscription,
        key: LicenseKey,
    }

    async fn subscribed_org() -> Fixture {
        let store = Arc::new(InMemoryBillingStore::new());
        let catalog = Arc::new(InMemoryCatalogStore::new());

        let org = Organization::new("Acme Corp").unwrap();
        store.register_organization(org.clone()).await.unwrap();
        let plan = SubscriptionPlan::new(
            "Basic",
            PlanType::Basic,
            BillingPeriod::Monthly,
            dec!(29),
        )
        .unwrap();
        catalog.create_plan(plan.clone()).await.unwrap();

        let lifecycle = SubscriptionLifecycle::new(store.clone(), catalog.clone());
        let subscription = lifecycle.create(org.id, plan.id, true).await.unwrap();
        let key = store
            .license_for_subscription(subscription.id)
            .await
            .unwrap()
            .unwrap();
        let validator = LicenseKeyValidator::new(store.clone(), catalog);

        Fixture {
            validator,
            lifecycle,
            store,
            subscription,
            key,
        }
    }

    #[test]
    fn test_generate_key_format() {
        let key = generate_key();
        assert!(key.starts_with("LIC-"));
        assert_eq!(key.len(), 36);
        assert!(key[4..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_generate_key_unique() {
        assert_ne!(generate_key(), generate_key());
    }

    #[tokio::test]
    async fn test_validate_live_key() {
        let fx = subscribed_org().await;
        let result = fx.validator.validate(&fx.key.key).await.unwrap();

        assert!(result.valid);
        assert_eq!(result.organization.name, "Acme Corp");
        assert_eq!(result.plan.name, "Basic");
        assert_eq!(result.subscription.status, SubscriptionStatus::Active);

        let touched = fx
            .store
            .license_key(&fx.key.key)
            .await
            .unwrap()
            .unwrap();
        assert!(touched.last_validated_at.is_some());
    }

    #[tokio::test]
    async fn test_validate_unknown_key() {
        let fx = subscribed_org().await;
        let err = fx.validator.validate("LIC-DOESNOTEXIST").await.unwrap_err();
        assert!(matches!(err, AuthzError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_validate_revoked_key() {
        let fx = subscribed_org().await;
        fx.validator.revoke(&fx.key.key).await.unwrap();

        let err = fx.validator.validate(&fx.key.key).await.unwrap_err();
        assert!(matches!(err, AuthzError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_validate_expired_key() {
        let fx = subscribed_org().await;
        let mut key = fx.key.clone();
        key.expires_at = Some(Utc::now() - chrono::Duration::days(1));
        fx.store.update_license_key(key).await.unwrap();

        let err = fx.validator.validate(&fx.key.key).await.unwrap_err();
        assert!(matches!(err, AuthzError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_validate_canceled_subscription() {
        let fx = subscribed_org().await;
        fx.lifecycle.cancel(fx.subscription.id).await.unwrap();

        let err = fx.validator.validate(&fx.key.key).await.unwrap_err();
        match err {
            AuthzError::BadRequest(msg) => assert!(msg.contains("canceled")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_revoke_twice_rejected() {
        let fx = subscribed_org().await;
        fx.validator.revoke(&fx.key.key).await.unwrap();
        let err = fx.validator.revoke(&fx.key.key).await.unwrap_err();
        assert!(matches!(err, AuthzError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_rotate_revokes_previous_key() {
        let fx = subscribed_org().await;
        let fresh = fx.validator.rotate(fx.subscription.id).await.unwrap();
        assert_ne!(fresh.key, fx.key.key);

        let err = fx.validator.validate(&fx.key.key).await.unwrap_err();
        assert!(matches!(err, AuthzError::BadRequest(_)));
        let result = fx.validator.validate(&fresh.key).await.unwrap();
        assert!(result.valid);
    }
}
