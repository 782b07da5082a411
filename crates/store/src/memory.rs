use crate::error::StoreError;
use crate::{AlertSink, SnapshotStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Alert, KpiSnapshot, MetricCode, Period};
use tokio::sync::Mutex;

/// In-memory snapshot log for tests and the demo path.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    rows: Mutex<Vec<KpiSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn upsert(&self, snapshot: KpiSnapshot) -> Result<KpiSnapshot, StoreError> {
        let mut rows = self.rows.lock().await;
        let key = |s: &KpiSnapshot| {
            s.metric_code == snapshot.metric_code
                && s.segment == snapshot.segment
                && s.period.start == snapshot.period.start
        };
        if let Some(existing) = rows.iter_mut().find(|s| key(s)) {
            // Same key: the row keeps its identity, the value is replaced.
            let mut replacement = snapshot;
            replacement.id = existing.id;
            *existing = replacement.clone();
            return Ok(replacement);
        }
        rows.push(snapshot.clone());
        Ok(snapshot)
    }

    async fn find(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<Option<KpiSnapshot>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|s| {
                s.metric_code == code
                    && s.segment == segment
                    && s.period.start == period.start
            })
            .cloned())
    }

    async fn latest_before(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<Option<KpiSnapshot>, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|s| {
                s.metric_code == code
                    && s.segment == segment
                    && s.period.start < period.start
            })
            .max_by_key(|s| s.period.start)
            .cloned())
    }

    async fn range(
        &self,
        code: MetricCode,
        segment: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<KpiSnapshot>, StoreError> {
        let rows = self.rows.lock().await;
        let mut selected: Vec<KpiSnapshot> = rows
            .iter()
            .filter(|s| {
                s.metric_code == code
                    && s.segment == segment
                    && s.period.start >= from
                    && s.period.start < to
            })
            .cloned()
            .collect();
        selected.sort_by_key(|s| s.period.start);
        Ok(selected)
    }
}

/// In-memory alert table for tests and the demo path.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    rows: Mutex<Vec<Alert>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Alert> {
        self.rows.lock().await.clone()
    }

    /// Flips the acknowledged flag, releasing the idempotency hold for the
    /// alert's key. The live notification surface does this through the
    /// database.
    pub async fn acknowledge(&self, id: uuid::Uuid) {
        let mut rows = self.rows.lock().await;
        if let Some(alert) = rows.iter_mut().find(|a| a.id == id) {
            alert.acknowledged = true;
        }
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn insert(&self, alert: Alert) -> Result<Alert, StoreError> {
        let mut rows = self.rows.lock().await;
        rows.push(alert.clone());
        Ok(alert)
    }

    async fn has_open(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<bool, StoreError> {
        let rows = self.rows.lock().await;
        Ok(rows.iter().any(|a| {
            a.metric_code == code
                && a.segment == segment
                && a.period.start == period.start
                && !a.acknowledged
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{AlertSeverity, Unit};
    use rust_decimal::Decimal;

    fn snapshot(code: MetricCode, month: u32, value: i64) -> KpiSnapshot {
        KpiSnapshot::new(
            code,
            "resale",
            Period::month(2025, month).unwrap(),
            Decimal::from(value),
            Unit::Percent,
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn upsert_replaces_the_same_period_without_duplicating() {
        let store = MemorySnapshotStore::new();
        let first = store
            .upsert(snapshot(MetricCode::ConversionRate, 3, 20))
            .await
            .unwrap();
        let second = store
            .upsert(snapshot(MetricCode::ConversionRate, 3, 25))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        // The row keeps its identity across recomputations.
        assert_eq!(first.id, second.id);
        let found = store
            .find(
                MetricCode::ConversionRate,
                "resale",
                Period::month(2025, 3).unwrap(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.value, Decimal::from(25));
    }

    #[tokio::test]
    async fn latest_before_picks_the_immediately_preceding_period() {
        let store = MemorySnapshotStore::new();
        for month in [1, 2, 3] {
            store
                .upsert(snapshot(MetricCode::ConversionRate, month, month as i64 * 10))
                .await
                .unwrap();
        }
        let previous = store
            .latest_before(
                MetricCode::ConversionRate,
                "resale",
                Period::month(2025, 3).unwrap(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(previous.period.label(), "2025-02");
    }

    #[tokio::test]
    async fn range_grows_monotonically_and_stays_ordered() {
        let store = MemorySnapshotStore::new();
        let from = Period::month(2025, 1).unwrap().start;
        let to = Period::month(2026, 1).unwrap().start;

        store
            .upsert(snapshot(MetricCode::StockIndex, 2, 90))
            .await
            .unwrap();
        let before = store
            .range(MetricCode::StockIndex, "resale", from, to)
            .await
            .unwrap();

        store
            .upsert(snapshot(MetricCode::StockIndex, 1, 80))
            .await
            .unwrap();
        store
            .upsert(snapshot(MetricCode::StockIndex, 4, 110))
            .await
            .unwrap();
        let after = store
            .range(MetricCode::StockIndex, "resale", from, to)
            .await
            .unwrap();

        assert!(after.len() >= before.len());
        let labels: Vec<String> = after.iter().map(|s| s.period.label()).collect();
        assert_eq!(labels, vec!["2025-01", "2025-02", "2025-04"]);
    }

    #[tokio::test]
    async fn open_alert_blocks_until_acknowledged() {
        let sink = MemoryAlertSink::new();
        let period = Period::month(2025, 3).unwrap();
        let alert = Alert::new(
            MetricCode::ConversionRate,
            "resale",
            period,
            AlertSeverity::Warning,
            "conversion_rate below minimum",
        );
        let stored = sink.insert(alert).await.unwrap();

        assert!(sink
            .has_open(MetricCode::ConversionRate, "resale", period)
            .await
            .unwrap());

        sink.acknowledge(stored.id).await;
        assert!(!sink
            .has_open(MetricCode::ConversionRate, "resale", period)
            .await
            .unwrap());
    }
}
