//! Catalog persistence seam
//!
//! `CatalogStore` is the trait real deployments back with a database; the
//! in-memory implementation is the reference behavior and the test double.
//! Uniqueness of feature codes, plan slugs, and (plan, feature) pairs lives
//! here so application code cannot race past it.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use authz_common::{AuthzError, AuthzResult, FeatureId, PlanId};

use crate::model::{Feature, PlanFeature, SubscriptionPlan};

/// Storage seam for catalog records
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a feature; `Conflict` when the code is taken
    async fn create_feature(&self, feature: Feature) -> AuthzResult<Feature>;

    /// Feature by unique code
    async fn feature_by_code(&self, code: &str) -> AuthzResult<Option<Feature>>;

    /// Feature by id
    async fn feature(&self, id: FeatureId) -> AuthzResult<Option<Feature>>;

    /// Insert a plan; `Conflict` when the slug is taken
    async fn create_plan(&self, plan: SubscriptionPlan) -> AuthzResult<SubscriptionPlan>;

    /// Plan by id
    async fn plan(&self, id: PlanId) -> AuthzResult<Option<SubscriptionPlan>>;

    /// Plan by unique slug
    async fn plan_by_slug(&self, slug: &str) -> AuthzResult<Option<SubscriptionPlan>>;

    /// Active plans
    async fn list_plans(&self) -> AuthzResult<Vec<SubscriptionPlan>>;

    /// Upsert the grant for (plan, feature)
    async fn set_plan_feature(&self, grant: PlanFeature) -> AuthzResult<()>;

    /// Grant for (plan, feature), if any
    async fn plan_feature(
        &self,
        plan_id: PlanId,
        feature_id: FeatureId,
    ) -> AuthzResult<Option<PlanFeature>>;
}

#[derive(Default)]
struct CatalogState {
    features: HashMap<FeatureId, Feature>,
    feature_codes: HashMap<String, FeatureId>,
    plans: HashMap<PlanId, SubscriptionPlan>,
    plan_slugs: HashMap<String, PlanId>,
    plan_features: HashMap<(PlanId, FeatureId), PlanFeature>,
}

/// In-memory catalog store
///
/// One lock over all catalog state keeps check-then-insert atomic.
pub struct InMemoryCatalogStore {
    inner: RwLock<CatalogState>,
}

impl InMemoryCatalogStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CatalogState::default()),
        }
    }
}

impl Default for InMemoryCatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn create_feature(&self, feature: Feature) -> AuthzResult<Feature> {
        let mut state = self.inner.write();
        if state.feature_codes.contains_key(&feature.code) {
            return Err(AuthzError::Conflict(format!(
                "feature code '{}' already exists",
                feature.code
            )));
        }
        state.feature_codes.insert(feature.code.clone(), feature.id);
        state.features.insert(feature.id, feature.clone());
        tracing::info!("Feature created: {}", feature.code);
        Ok(feature)
    }

    async fn feature_by_code(&self, code: &str) -> AuthzResult<Option<Feature>> {
        let state = self.inner.read();
        Ok(state
            .feature_codes
            .get(code)
            .and_then(|id| state.features.get(id))
            .cloned())
    }

    async fn feature(&self, id: FeatureId) -> AuthzResult<Option<Feature>> {
        Ok(self.inner.read().features.get(&id).cloned())
    }

    async fn create_plan(&self, plan: SubscriptionPlan) -> AuthzResult<SubscriptionPlan> {
        let mut state = self.inner.write();
        if state.plan_slugs.contains_key(&plan.slug) {
            return Err(AuthzError::Conflict(format!(
                "plan slug '{}' already exists",
                plan.slug
            )));
        }
        state.plan_slugs.insert(plan.slug.clone(), plan.id);
        state.plans.insert(plan.id, plan.clone());
        tracing::info!("Plan created: {}", plan.slug);
        Ok(plan)
    }

    async fn plan(&self, id: PlanId) -> AuthzResult<Option<SubscriptionPlan>> {
        Ok(self.inner.read().plans.get(&id).cloned())
    }

    async fn plan_by_slug(&self, slug: &str) -> AuthzResult<Option<SubscriptionPlan>> {
        let state = self.inner.read();
        Ok(state
            .plan_slugs
            .get(slug)
            .and_then(|id| state.plans.get(id))
            .cloned())
    }

    async fn list_plans(&self) -> AuthzResult<Vec<SubscriptionPlan>> {
        Ok(self
            .inner
            .read()
            .plans
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn set_plan_feature(&self, grant: PlanFeature) -> AuthzResult<()> {
        self.inner
            .write()
            .plan_features
            .insert((grant.plan_id, grant.feature_id), grant);
        Ok(())
    }

    async fn plan_feature(
        &self,
        plan_id: PlanId,
        feature_id: FeatureId,
    ) -> AuthzResult<Option<PlanFeature>> {
        Ok(self
            .inner
            .read()
            .plan_features
            .get(&(plan_id, feature_id))
            .cloned())
    }
}
