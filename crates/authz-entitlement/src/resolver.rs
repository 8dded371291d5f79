//! Entitlement Resolution

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use authz_billing::subscriptions::SubscriptionLifecycle;
use authz_catalog::model::{Feature, FeatureKind};
use authz_catalog::store::CatalogStore;
use authz_common::{AuthzError, AuthzResult, FeatureId, OrganizationId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::model::{FeatureAccess, FeatureOverride};
use crate::usage::UsageTracker;

/// Storage seam for per-organization overrides
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// Upsert the override for its `(organization, feature)` pair
    async fn put_override(&self, record: FeatureOverride) -> AuthzResult<()>;

    /// Override for the pair, if any
    async fn override_for(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
    ) -> AuthzResult<Option<FeatureOverride>>;

    /// Remove the override; `NotFound` when none exists
    async fn remove_override(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
    ) -> AuthzResult<()>;
}

/// In-memory override store
pub struct InMemoryOverrideStore {
    inner: RwLock<HashMap<(OrganizationId, FeatureId), FeatureOverride>>,
}

impl InMemoryOverrideStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryOverrideStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OverrideStore for InMemoryOverrideStore {
    async fn put_override(&self, record: FeatureOverride) -> AuthzResult<()> {
        self.inner
            .write()
            .insert((record.organization_id, record.feature_id), record);
        Ok(())
    }

    async fn override_for(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
    ) -> AuthzResult<Option<FeatureOverride>> {
        Ok(self
            .inner
            .read()
            .get(&(organization_id, feature_id))
            .cloned())
    }

    async fn remove_override(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
    ) -> AuthzResult<()> {
        match self.inner.write().remove(&(organization_id, feature_id)) {
            Some(_) => Ok(()),
            None => Err(AuthzError::NotFound(format!(
                "no override for feature {} in organization {}",
                feature_id, organization_id
            ))),
        }
    }
}

/// Entitlement resolver
///
/// Resolves whether an organization may use a feature, in strict
/// precedence order: override first, then the active subscription's
/// plan grant, then nothing. A present override always ends
/// resolution, granting or denying on its own terms.
pub struct EntitlementResolver {
    catalog: Arc<dyn CatalogStore>,
    lifecycle: Arc<SubscriptionLifecycle>,
    overrides: Arc<dyn OverrideStore>,
    usage: Arc<UsageTracker>,
}

impl EntitlementResolver {
    /// Create a resolver over the catalog, lifecycle, override and
    /// usage seams
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        lifecycle: Arc<SubscriptionLifecycle>,
        overrides: Arc<dyn OverrideStore>,
        usage: Arc<UsageTracker>,
    ) -> Self {
        Self {
            catalog,
            lifecycle,
            overrides,
            usage,
        }
    }

    /// Resolve access for `(organization, feature code)`
    ///
    /// "Not entitled" is a normal result, not an error; only an
    /// unknown or inactive feature code fails.
    pub async fn check_feature_access(
        &self,
        organization_id: OrganizationId,
        feature_code: &str,
    ) -> AuthzResult<FeatureAccess> {
        let feature = self.active_feature(feature_code).await?;
        let now = Utc::now();

        if let Some(record) = self
            .overrides
            .override_for(organization_id, feature.id)
            .await?
        {
            if record.is_effective(now) {
                return Ok(FeatureAccess::granted(record.value));
            }
            return Ok(FeatureAccess::denied());
        }

        let subscription = match self.lifecycle.active_subscription(organization_id).await? {
            Some(sub) => sub,
            None => return Ok(FeatureAccess::denied()),
        };

        let grant = match self
            .catalog
            .plan_feature(subscription.plan_id, feature.id)
            .await?
        {
            Some(grant) if grant.is_enabled => grant,
            _ => return Ok(FeatureAccess::denied()),
        };

        match feature.kind {
            FeatureKind::Boolean | FeatureKind::Flag => Ok(FeatureAccess::granted(grant.value)),
            FeatureKind::Limit | FeatureKind::Quota => {
                let limit = grant
                    .value
                    .as_deref()
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .unwrap_or(0);
                let used = self.usage.usage(organization_id, feature.id).await?;
                Ok(FeatureAccess {
                    has_access: used < limit,
                    value: grant.value,
                    remaining: Some(limit.saturating_sub(used)),
                })
            }
        }
    }

    /// Resolve and fail with `Forbidden` unless access is granted
    pub async fn assert_access(
        &self,
        organization_id: OrganizationId,
        feature_code: &str,
    ) -> AuthzResult<FeatureAccess> {
        let access = self
            .check_feature_access(organization_id, feature_code)
            .await?;
        if !access.has_access {
            return Err(AuthzError::Forbidden(format!(
                "feature '{}' is not entitled for organization {}",
                feature_code, organization_id
            )));
        }
        Ok(access)
    }

    /// Upsert an enabled override granting the feature at `value`
    pub async fn grant_override(
        &self,
        organization_id: OrganizationId,
        feature_code: &str,
        value: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AuthzResult<FeatureOverride> {
        let feature = self.active_feature(feature_code).await?;
        let mut record = FeatureOverride::grant(organization_id, feature.id, value);
        record.expires_at = expires_at;
        self.overrides.put_override(record.clone()).await?;
        tracing::info!(
            "Override granted: {} for org {}",
            feature_code,
            organization_id
        );
        Ok(record)
    }

    /// Upsert a disabled override: an absolute revoke that also blocks
    /// plan fallback
    pub async fn deny_override(
        &self,
        organization_id: OrganizationId,
        feature_code: &str,
    ) -> AuthzResult<FeatureOverride> {
        let feature = self.active_feature(feature_code).await?;
        let record = FeatureOverride::deny(organization_id, feature.id);
        self.overrides.put_override(record.clone()).await?;
        tracing::info!(
            "Override denied: {} for org {}",
            feature_code,
            organization_id
        );
        Ok(record)
    }

    /// Drop the override, restoring plan-derived resolution
    pub async fn remove_override(
        &self,
        organization_id: OrganizationId,
        feature_code: &str,
    ) -> AuthzResult<()> {
        let feature = self.active_feature(feature_code).await?;
        self.overrides
            .remove_override(organization_id, feature.id)
            .await?;
        tracing::info!(
            "Override removed: {} for org {}",
            feature_code,
            organization_id
        );
        Ok(())
    }

    async fn active_feature(&self, code: &str) -> AuthzResult<Feature> {
        let feature = self
            .catalog
            .feature_by_code(code)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("feature '{}' not found", code)))?;
        if !feature.is_active {
            return Err(AuthzError::NotFound(format!(
                "feature '{}' is inactive",
                code
            )));
        }
        Ok(feature)
    }
}
