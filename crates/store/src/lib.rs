use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Alert, KpiSnapshot, MetricCode, Period};

mod error;
pub mod memory;

// --- Public API ---
pub use error::StoreError;
pub use memory::{MemoryAlertSink, MemorySnapshotStore};

/// The append-only historical log of computed KPI values.
///
/// `upsert` is the only mutation the engine is given: rows are keyed by
/// `(metric_code, segment, period.start)`, so recomputing an already-closed
/// period overwrites its value instead of duplicating it, and nothing ever
/// deletes a row.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Writes a snapshot, replacing any existing row with the same
    /// `(metric_code, segment, period.start)` key. Returns the stored row,
    /// which keeps the id of the row it replaced.
    async fn upsert(&self, snapshot: KpiSnapshot) -> Result<KpiSnapshot, StoreError>;

    /// Point lookup for one metric/segment/period.
    async fn find(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<Option<KpiSnapshot>, StoreError>;

    /// The snapshot of the immediately preceding period: same code and
    /// segment, `period.start` strictly before the given period's start,
    /// latest first.
    async fn latest_before(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<Option<KpiSnapshot>, StoreError>;

    /// All snapshots whose period starts within `[from, to)`, ascending by
    /// period start. Feeds the trend charts.
    async fn range(
        &self,
        code: MetricCode,
        segment: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<KpiSnapshot>, StoreError>;
}

/// Write interface for threshold-breach alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn insert(&self, alert: Alert) -> Result<Alert, StoreError>;

    /// True when an unacknowledged alert already exists for the
    /// `(metric_code, segment, period)` key. The emitter uses this to avoid
    /// raising duplicates while a breach is still open.
    async fn has_open(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<bool, StoreError>;
}
