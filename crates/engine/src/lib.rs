use crate::comparator::Comparator;
use crate::error::EngineError;
use accessor::{BusinessData, TimeoutAccessor};
use alerter::AlertEmitter;
use chrono::{DateTime, Utc};
use configuration::{Config, SegmentSettings};
use core_types::{ComparisonResult, KpiSnapshot, MetricCode, Period};
use futures::future::join_all;
use indicators::{IndicatorEngine, MetricOutcome};
use serde::Serialize;
use std::sync::Arc;
use store::{AlertSink, SnapshotStore};

pub mod comparator;
pub mod error;
pub mod scheduler;

pub use scheduler::KpiScheduler;

/// Tally of one full computation cycle, logged at completion and returned
/// to manual callers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub period: String,
    pub segments: usize,
    pub snapshots_written: usize,
    pub partial_failures: usize,
    pub alerts_raised: usize,
}

#[derive(Debug, Default)]
struct SegmentTally {
    written: usize,
    failures: usize,
    alerts: usize,
}

/// The central orchestrator of the KPI engine.
///
/// Owns the calculator, comparator and alert emitter, and reaches
/// persistence and business data exclusively through the injected trait
/// objects, so the same engine runs against Postgres in production and
/// against the in-memory fixtures in tests and the demo.
pub struct KpiEngine {
    config: Config,
    indicators: IndicatorEngine,
    comparator: Comparator,
    emitter: AlertEmitter,
    snapshots: Arc<dyn SnapshotStore>,
}

impl KpiEngine {
    /// Wires up the engine. The business data accessor is wrapped with the
    /// configured per-query timeout before the calculators ever see it.
    pub fn new(
        config: Config,
        business_data: Arc<dyn BusinessData>,
        snapshots: Arc<dyn SnapshotStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let bounded: Arc<dyn BusinessData> = Arc::new(TimeoutAccessor::new(
            business_data,
            config.engine.accessor_timeout,
        ));
        let indicators = IndicatorEngine::new(bounded, config.segments.clone());
        let comparator = Comparator::new(Arc::clone(&snapshots));
        let emitter = AlertEmitter::new(alerts, config.alerting.clone());
        Self {
            config,
            indicators,
            comparator,
            emitter,
            snapshots,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn indicators(&self) -> &IndicatorEngine {
        &self.indicators
    }

    /// On-demand computation of the full catalog for one segment, without
    /// touching the snapshot store. Used by dashboard and report requests.
    pub async fn compute_all(&self, segment: &str, period: Period) -> Vec<MetricOutcome> {
        self.indicators.compute_all(segment, period).await
    }

    /// The dashboard's "vs previous period" view. The current snapshot is
    /// computed and persisted first if this period has not been snapshotted
    /// yet.
    pub async fn compare(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<ComparisonResult, EngineError> {
        let current = match self.snapshots.find(code, segment, period).await? {
            Some(snapshot) => snapshot,
            None => self.snapshot_metric(code, segment, period).await?,
        };
        self.comparator.compare_snapshot(current).await
    }

    /// Snapshot history for trend charts, ascending by period start.
    pub async fn history(
        &self,
        code: MetricCode,
        segment: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<KpiSnapshot>, EngineError> {
        Ok(self.snapshots.range(code, segment, from, to).await?)
    }

    /// Computes one metric and persists its snapshot.
    pub async fn snapshot_metric(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<KpiSnapshot, EngineError> {
        let value = self.indicators.compute(code, segment, period).await?;
        let snapshot = KpiSnapshot::new(
            code,
            segment,
            period,
            value.value,
            value.unit,
            value.metadata,
        );
        self.persist_with_retry(snapshot).await
    }

    /// One full computation cycle: every active segment times every
    /// registered metric, followed by comparison and alerting over each
    /// freshly written snapshot. Segments fan out concurrently; partial
    /// failures are tallied, never escalated.
    pub async fn run_cycle(&self, period: Period) -> CycleReport {
        let segments: Vec<&SegmentSettings> = self.config.active_segments().collect();
        tracing::info!(
            period = %period.label(),
            segments = segments.len(),
            "Starting KPI computation cycle."
        );

        let tallies = join_all(
            segments
                .iter()
                .map(|segment| self.run_segment(&segment.code, period)),
        )
        .await;

        let mut report = CycleReport {
            period: period.label(),
            segments: segments.len(),
            ..CycleReport::default()
        };
        for tally in tallies {
            report.snapshots_written += tally.written;
            report.partial_failures += tally.failures;
            report.alerts_raised += tally.alerts;
        }

        tracing::info!(
            period = %report.period,
            snapshots = report.snapshots_written,
            failures = report.partial_failures,
            alerts = report.alerts_raised,
            "KPI computation cycle complete."
        );
        report
    }

    async fn run_segment(&self, segment: &str, period: Period) -> SegmentTally {
        let mut tally = SegmentTally::default();
        for outcome in self.indicators.compute_all(segment, period).await {
            let value = match outcome.result {
                Ok(value) => value,
                Err(_) => {
                    // Already logged by the calculator with the metric code.
                    tally.failures += 1;
                    continue;
                }
            };
            let snapshot = KpiSnapshot::new(
                outcome.code,
                segment,
                period,
                value.value,
                value.unit,
                value.metadata,
            );
            let stored = match self.persist_with_retry(snapshot).await {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::error!(
                        metric = %outcome.code,
                        segment,
                        error = %e,
                        "Snapshot persistence failed after retry; skipping metric."
                    );
                    tally.failures += 1;
                    continue;
                }
            };
            tally.written += 1;

            match self.comparator.compare_snapshot(stored.clone()).await {
                Ok(comparison) => {
                    tracing::debug!(
                        metric = %stored.metric_code,
                        segment,
                        value = %stored.value,
                        delta = %comparison.absolute_delta,
                        "Snapshot compared against previous period."
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        metric = %stored.metric_code,
                        segment,
                        error = %e,
                        "Comparison against previous period failed."
                    );
                }
            }

            // Alerting is best-effort: the snapshot is already durable.
            let definition = self.indicators.registry().get(stored.metric_code);
            match self.emitter.evaluate(definition, &stored).await {
                Ok(Some(_)) => tally.alerts += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        metric = %stored.metric_code,
                        segment,
                        error = %e,
                        "Alert evaluation failed; snapshot remains persisted."
                    );
                }
            }
        }
        tally
    }

    /// Upserts a snapshot, retrying once after a short backoff before giving
    /// up on that metric for the cycle.
    async fn persist_with_retry(&self, snapshot: KpiSnapshot) -> Result<KpiSnapshot, EngineError> {
        match self.snapshots.upsert(snapshot.clone()).await {
            Ok(stored) => Ok(stored),
            Err(first) => {
                tracing::warn!(
                    metric = %snapshot.metric_code,
                    error = %first,
                    "Snapshot write failed; retrying once."
                );
                tokio::time::sleep(self.config.engine.persist_retry_backoff).await;
                Ok(self.snapshots.upsert(snapshot).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessor::memory::InMemoryBusinessData;
    use async_trait::async_trait;
    use chrono::Duration;
    use configuration::{AlertingSettings, EngineSettings};
    use core_types::{PropertyState, Unit};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use store::{MemoryAlertSink, MemorySnapshotStore, StoreError};

    fn config() -> Config {
        Config {
            engine: EngineSettings {
                persist_retry_backoff: std::time::Duration::from_millis(1),
                ..EngineSettings::default()
            },
            segments: vec![SegmentSettings {
                code: "resale".to_string(),
                name: "Resale".to_string(),
                target_stock: None,
                active: true,
            }],
            alerting: AlertingSettings::default(),
        }
    }

    fn march() -> Period {
        Period::month(2025, 3).unwrap()
    }

    fn march_portfolio() -> InMemoryBusinessData {
        use accessor::memory::PropertyRecord;
        let period = march();
        let sale_day = period.start + Duration::days(19);
        let mut properties = Vec::new();
        for days in [10i64, 20, 30, 40, 50] {
            properties.push(PropertyRecord {
                segment: "resale".to_string(),
                state: PropertyState::Sold,
                price: dec!(240_000),
                acquisition_cost: dec!(200_000),
                commission_amount: dec!(7_200),
                broker_split_pct: dec!(0.5),
                broker_id: "broker-0".to_string(),
                created_at: sale_day - Duration::days(days),
                sold_at: Some(sale_day),
            });
        }
        for i in 0..15i64 {
            properties.push(PropertyRecord {
                segment: "resale".to_string(),
                state: PropertyState::Available,
                price: dec!(220_000),
                acquisition_cost: dec!(180_000),
                commission_amount: dec!(6_600),
                broker_split_pct: dec!(0.5),
                broker_id: "broker-1".to_string(),
                created_at: period.start + Duration::days(i % 28),
                sold_at: None,
            });
        }
        InMemoryBusinessData::new(properties, vec![])
    }

    fn engine_with(
        snapshots: Arc<dyn SnapshotStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> KpiEngine {
        KpiEngine::new(
            config(),
            Arc::new(march_portfolio()),
            snapshots,
            alerts,
        )
    }

    #[tokio::test]
    async fn a_cycle_snapshots_the_whole_catalog() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let engine = engine_with(snapshots.clone(), Arc::new(MemoryAlertSink::new()));

        let report = engine.run_cycle(march()).await;
        assert_eq!(report.segments, 1);
        assert_eq!(report.snapshots_written, MetricCode::ALL.len());
        assert_eq!(report.partial_failures, 0);
        assert_eq!(snapshots.len().await, MetricCode::ALL.len());

        // Recomputing the same period overwrites rather than duplicating.
        let report = engine.run_cycle(march()).await;
        assert_eq!(report.snapshots_written, MetricCode::ALL.len());
        assert_eq!(snapshots.len().await, MetricCode::ALL.len());
    }

    #[tokio::test]
    async fn compare_computes_the_current_period_when_missing() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let engine = engine_with(snapshots.clone(), Arc::new(MemoryAlertSink::new()));

        let result = engine
            .compare(MetricCode::ConversionRate, "resale", march())
            .await
            .unwrap();
        assert_eq!(result.current.value, dec!(25));
        assert!(result.previous.is_none());
        assert!(result.percentage_delta.is_none());
        // The computed-on-demand snapshot was persisted.
        assert_eq!(snapshots.len().await, 1);
    }

    #[tokio::test]
    async fn history_returns_the_recorded_series_in_order() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let engine = engine_with(snapshots.clone(), Arc::new(MemoryAlertSink::new()));

        for month in [1u32, 2, 3] {
            let period = Period::month(2025, month).unwrap();
            snapshots
                .upsert(KpiSnapshot::new(
                    MetricCode::StockIndex,
                    "resale",
                    period,
                    Decimal::from(month as i64 * 10),
                    Unit::Index,
                    serde_json::json!({}),
                ))
                .await
                .unwrap();
        }

        let series = engine
            .history(
                MetricCode::StockIndex,
                "resale",
                Period::month(2025, 1).unwrap().start,
                Period::month(2025, 4).unwrap().start,
            )
            .await
            .unwrap();
        let labels: Vec<String> = series.iter().map(|s| s.period.label()).collect();
        assert_eq!(labels, vec!["2025-01", "2025-02", "2025-03"]);
    }

    /// Fails the first `failures` upserts, then delegates to the in-memory
    /// store.
    struct FlakyStore {
        inner: MemorySnapshotStore,
        remaining_failures: AtomicUsize,
    }

    impl FlakyStore {
        fn failing(times: usize) -> Self {
            Self {
                inner: MemorySnapshotStore::new(),
                remaining_failures: AtomicUsize::new(times),
            }
        }
    }

    #[async_trait]
    impl SnapshotStore for FlakyStore {
        async fn upsert(&self, snapshot: KpiSnapshot) -> Result<KpiSnapshot, StoreError> {
            if self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Write("injected failure".to_string()));
            }
            self.inner.upsert(snapshot).await
        }

        async fn find(
            &self,
            code: MetricCode,
            segment: &str,
            period: Period,
        ) -> Result<Option<KpiSnapshot>, StoreError> {
            self.inner.find(code, segment, period).await
        }

        async fn latest_before(
            &self,
            code: MetricCode,
            segment: &str,
            period: Period,
        ) -> Result<Option<KpiSnapshot>, StoreError> {
            self.inner.latest_before(code, segment, period).await
        }

        async fn range(
            &self,
            code: MetricCode,
            segment: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<KpiSnapshot>, StoreError> {
            self.inner.range(code, segment, from, to).await
        }
    }

    #[tokio::test]
    async fn a_transient_write_failure_is_retried_once() {
        let snapshots = Arc::new(FlakyStore::failing(1));
        let engine = engine_with(snapshots.clone(), Arc::new(MemoryAlertSink::new()));

        let stored = engine
            .snapshot_metric(MetricCode::ConversionRate, "resale", march())
            .await
            .unwrap();
        assert_eq!(stored.value, dec!(25));
        assert_eq!(snapshots.inner.len().await, 1);
    }

    #[tokio::test]
    async fn a_persistent_write_failure_becomes_a_partial_failure() {
        // Enough injected failures to exhaust the retry for one metric; the
        // rest of the catalog still lands.
        let snapshots = Arc::new(FlakyStore::failing(2));
        let engine = engine_with(snapshots.clone(), Arc::new(MemoryAlertSink::new()));

        let report = engine.run_cycle(march()).await;
        assert_eq!(report.partial_failures, 1);
        assert_eq!(report.snapshots_written, MetricCode::ALL.len() - 1);
        assert_eq!(snapshots.inner.len().await, MetricCode::ALL.len() - 1);
    }
}
