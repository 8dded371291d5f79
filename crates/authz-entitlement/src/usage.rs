//! Usage Metering
//!
//! Counters are keyed by `(organization, feature, period_start)` and
//! only ever move up inside a period. The increment is an atomic
//! upsert at the storage layer; read-then-write-then-save would lose
//! updates under concurrency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use authz_common::{AuthzResult, FeatureId, OrganizationId, UserId};
use chrono::{DateTime, Datelike, Duration, Months, TimeZone, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::model::UsageRecord;

/// A closed billing window, here always a calendar month in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingWindow {
    /// First instant of the window.
    pub start: DateTime<Utc>,
    /// Last instant of the window.
    pub end: DateTime<Utc>,
}

impl BillingWindow {
    /// The calendar-month window containing `now`. Pure and total, so
    /// every caller in a process derives the identical window for the
    /// same instant.
    pub fn current_period(now: DateTime<Utc>) -> Self {
        let start = Utc
            .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(now);
        let end = start + Months::new(1) - Duration::seconds(1);
        Self { start, end }
    }
}

/// Storage seam for usage counters
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Counter value for the window, 0 when no record exists. Never
    /// creates a record.
    async fn usage(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
        window: BillingWindow,
    ) -> AuthzResult<u64>;

    /// Atomically add `amount`, creating the record at zero first.
    /// Returns the committed total.
    async fn add_usage(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
        amount: u64,
        window: BillingWindow,
    ) -> AuthzResult<u64>;

    /// Snapshot of an organization's records in the window
    async fn usage_for_period(
        &self,
        organization_id: OrganizationId,
        window: BillingWindow,
    ) -> AuthzResult<Vec<UsageRecord>>;
}

struct PeriodCounter {
    period_end: DateTime<Utc>,
    count: AtomicU64,
}

/// In-memory usage store. The shard lock taken by `entry` makes the
/// find-or-create race-safe; the counter itself is atomic.
pub struct InMemoryUsageStore {
    counters: DashMap<(OrganizationId, FeatureId, DateTime<Utc>), PeriodCounter>,
}

impl InMemoryUsageStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }
}

impl Default for InMemoryUsageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn usage(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
        window: BillingWindow,
    ) -> AuthzResult<u64> {
        Ok(self
            .counters
            .get(&(organization_id, feature_id, window.start))
            .map_or(0, |c| c.count.load(Ordering::Relaxed)))
    }

    async fn add_usage(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
        amount: u64,
        window: BillingWindow,
    ) -> AuthzResult<u64> {
        let counter = self
            .counters
            .entry((organization_id, feature_id, window.start))
            .or_insert_with(|| PeriodCounter {
                period_end: window.end,
                count: AtomicU64::new(0),
            });
        Ok(counter.count.fetch_add(amount, Ordering::Relaxed) + amount)
    }

    async fn usage_for_period(
        &self,
        organization_id: OrganizationId,
        window: BillingWindow,
    ) -> AuthzResult<Vec<UsageRecord>> {
        Ok(self
            .counters
            .iter()
            .filter(|entry| {
                let (org, _, start) = *entry.key();
                org == organization_id && start == window.start
            })
            .map(|entry| {
                let (org, feature, start) = *entry.key();
                UsageRecord {
                    organization_id: org,
                    feature_id: feature,
                    period_start: start,
                    period_end: entry.value().period_end,
                    usage_count: entry.value().count.load(Ordering::Relaxed),
                }
            })
            .collect())
    }
}

/// Usage tracker
///
/// Thin façade over the usage store that pins every call to the
/// calendar-month window containing "now".
pub struct UsageTracker {
    store: Arc<dyn UsageStore>,
}

impl UsageTracker {
    /// Create a tracker over a usage store
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// The billing window containing `now`
    pub fn current_period(now: DateTime<Utc>) -> BillingWindow {
        BillingWindow::current_period(now)
    }

    /// Current-period counter, 0 when nothing was recorded yet
    pub async fn usage(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
    ) -> AuthzResult<u64> {
        let window = BillingWindow::current_period(Utc::now());
        self.store.usage(organization_id, feature_id, window).await
    }

    /// Add `amount` to the current-period counter. `user_id` is
    /// attribution for the audit trail only; counters aggregate per
    /// organization.
    pub async fn record_usage(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
        amount: u64,
        user_id: Option<UserId>,
    ) -> AuthzResult<()> {
        let window = BillingWindow::current_period(Utc::now());
        let total = self
            .store
            .add_usage(organization_id, feature_id, amount, window)
            .await?;
        if let Some(user) = user_id {
            tracing::debug!(
                "Usage recorded: feature {} +{} by user {} (period total {})",
                feature_id,
                amount,
                user,
                total
            );
        }
        Ok(())
    }

    /// Record a single unit of consumption
    pub async fn record_one(
        &self,
        organization_id: OrganizationId,
        feature_id: FeatureId,
        user_id: Option<UserId>,
    ) -> AuthzResult<()> {
        self.record_usage(organization_id, feature_id, 1, user_id)
            .await
    }

    /// An organization's usage records for a window
    pub async fn usage_for_period(
        &self,
        organization_id: OrganizationId,
        window: BillingWindow,
    ) -> AuthzResult<Vec<UsageRecord>> {
        self.store.usage_for_period(organization_id, window).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_current_period_is_calendar_month() {
        let now = Utc.with_ymd_and_hms(2024, 2, 15, 12, 30, 0).unwrap();
        let window = BillingWindow::current_period(now);
        assert_eq!(
            window.start,
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn test_current_period_deterministic() {
        let a = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 7, 31, 23, 59, 59).unwrap();
        assert_eq!(
            BillingWindow::current_period(a),
            BillingWindow::current_period(b)
        );
        let c = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        assert_ne!(
            BillingWindow::current_period(a),
            BillingWindow::current_period(c)
        );
    }

    #[tokio::test]
    async fn test_usage_zero_without_record() {
        let tracker = UsageTracker::new(Arc::new(InMemoryUsageStore::new()));
        let used = tracker.usage(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert_eq!(used, 0);
    }

    #[tokio::test]
    async fn test_record_accumulates() {
        let tracker = UsageTracker::new(Arc::new(InMemoryUsageStore::new()));
        let (org, feature) = (Uuid::new_v4(), Uuid::new_v4());

        tracker.record_usage(org, feature, 3, None).await.unwrap();
        tracker
            .record_one(org, feature, Some(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(tracker.usage(org, feature).await.unwrap(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_lose_nothing() {
        let tracker = Arc::new(UsageTracker::new(Arc::new(InMemoryUsageStore::new())));
        let (org, feature) = (Uuid::new_v4(), Uuid::new_v4());

        let mut handles = Vec::new();
        for _ in 0..64 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move {
                tracker.record_usage(org, feature, 1, None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(tracker.usage(org, feature).await.unwrap(), 64);
    }

    #[tokio::test]
    async fn test_new_period_starts_at_zero() {
        let store = InMemoryUsageStore::new();
        let (org, feature) = (Uuid::new_v4(), Uuid::new_v4());
        let january =
            BillingWindow::current_period(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap());
        let february =
            BillingWindow::current_period(Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap());

        store.add_usage(org, feature, 9, january).await.unwrap();
        assert_eq!(store.usage(org, feature, january).await.unwrap(), 9);
        assert_eq!(store.usage(org, feature, february).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_usage_for_period_snapshot() {
        let store = InMemoryUsageStore::new();
        let org = Uuid::new_v4();
        let window = BillingWindow::current_period(Utc::now());

        store.add_usage(org, Uuid::new_v4(), 2, window).await.unwrap();
        store.add_usage(org, Uuid::new_v4(), 5, window).await.unwrap();
        store
            .add_usage(Uuid::new_v4(), Uuid::new_v4(), 7, window)
            .await
            .unwrap();

        let records = store.usage_for_period(org, window).await.unwrap();
        assert_eq!(records.len(), 2);
        let total: u64 = records.iter().map(|r| r.usage_count).sum();
        assert_eq!(total, 7);
    }
}
