use crate::{CycleReport, KpiEngine};
use core_types::Period;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::interval;

/// Drives the recurring computation cycle.
///
/// A two-state machine: idle, or running exactly one cycle. The guard mutex
/// is the state; a tick or manual trigger that arrives while a cycle is in
/// flight is dropped and logged, never queued, so cycles can never overlap.
/// A running cycle is not cancellable; it finishes (possibly with partial
/// failures) and the scheduler returns to idle.
pub struct KpiScheduler {
    engine: Arc<KpiEngine>,
    cycle_guard: Mutex<()>,
}

impl KpiScheduler {
    pub fn new(engine: Arc<KpiEngine>) -> Self {
        Self {
            engine,
            cycle_guard: Mutex::new(()),
        }
    }

    /// The timer loop. Runs a cycle for the current calendar month at the
    /// configured cadence, forever.
    pub async fn run(self: Arc<Self>) {
        let cadence = self.engine.config().engine.cadence;
        tracing::info!(cadence_secs = cadence.as_secs(), "KPI scheduler started.");

        // The first tick is immediate, so a freshly started engine computes
        // right away instead of waiting a full cadence.
        let mut timer = interval(cadence);
        loop {
            timer.tick().await;
            if self.trigger(Period::current_month()).await.is_none() {
                tracing::warn!("Previous cycle still running; tick dropped.");
            }
        }
    }

    /// Fires one cycle unless another is already running, in which case the
    /// trigger is dropped and `None` is returned.
    pub async fn trigger(&self, period: Period) -> Option<CycleReport> {
        let Ok(_running) = self.cycle_guard.try_lock() else {
            return None;
        };
        Some(self.engine.run_cycle(period).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accessor::InMemoryBusinessData;
    use configuration::{AlertingSettings, Config, EngineSettings, SegmentSettings};
    use core_types::MetricCode;
    use store::{MemoryAlertSink, MemorySnapshotStore};

    fn scheduler() -> KpiScheduler {
        let config = Config {
            engine: EngineSettings::default(),
            segments: vec![SegmentSettings {
                code: "resale".to_string(),
                name: "Resale".to_string(),
                target_stock: None,
                active: true,
            }],
            alerting: AlertingSettings::default(),
        };
        let engine = KpiEngine::new(
            config,
            Arc::new(InMemoryBusinessData::default()),
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(MemoryAlertSink::new()),
        );
        KpiScheduler::new(Arc::new(engine))
    }

    #[tokio::test]
    async fn a_trigger_runs_a_full_cycle() {
        let scheduler = scheduler();
        let report = scheduler
            .trigger(Period::month(2025, 3).unwrap())
            .await
            .expect("idle scheduler accepts the trigger");
        assert_eq!(report.segments, 1);
        assert_eq!(report.snapshots_written, MetricCode::ALL.len());
    }

    #[tokio::test]
    async fn a_trigger_during_a_running_cycle_is_dropped() {
        let scheduler = scheduler();
        // Hold the guard to simulate a cycle in flight.
        let _running = scheduler.cycle_guard.try_lock().unwrap();

        let report = scheduler.trigger(Period::month(2025, 3).unwrap()).await;
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn the_scheduler_returns_to_idle_after_a_cycle() {
        let scheduler = scheduler();
        let period = Period::month(2025, 3).unwrap();
        assert!(scheduler.trigger(period).await.is_some());
        // The guard was released, so the next trigger is accepted.
        assert!(scheduler.trigger(period).await.is_some());
    }
}
