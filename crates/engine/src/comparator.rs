use crate::error::EngineError;
use core_types::{ComparisonResult, KpiSnapshot};
use rust_decimal::Decimal;
use std::sync::Arc;
use store::SnapshotStore;

/// Compares a snapshot against the immediately preceding period of the same
/// metric and segment.
pub struct Comparator {
    snapshots: Arc<dyn SnapshotStore>,
}

impl Comparator {
    pub fn new(snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self { snapshots }
    }

    /// Builds the comparison for an already-computed snapshot. With no
    /// predecessor the deltas stay empty; a predecessor at zero yields an
    /// absolute delta but no percentage (there is nothing to take a
    /// percentage of).
    pub async fn compare_snapshot(
        &self,
        current: KpiSnapshot,
    ) -> Result<ComparisonResult, EngineError> {
        let previous = self
            .snapshots
            .latest_before(current.metric_code, &current.segment, current.period)
            .await?;

        let absolute_delta = previous
            .as_ref()
            .map(|p| current.value - p.value)
            .unwrap_or(Decimal::ZERO);
        let percentage_delta = previous.as_ref().and_then(|p| {
            if p.value.is_zero() {
                None
            } else {
                Some(absolute_delta / p.value * Decimal::ONE_HUNDRED)
            }
        });

        Ok(ComparisonResult {
            current,
            previous,
            absolute_delta,
            percentage_delta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{MetricCode, Period, Unit};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use store::MemorySnapshotStore;

    fn snapshot(month: u32, value: Decimal) -> KpiSnapshot {
        KpiSnapshot::new(
            MetricCode::ConversionRate,
            "resale",
            Period::month(2025, month).unwrap(),
            value,
            Unit::Percent,
            json!({}),
        )
    }

    #[tokio::test]
    async fn no_prior_snapshot_leaves_deltas_empty() {
        let store = Arc::new(MemorySnapshotStore::new());
        let comparator = Comparator::new(store);

        let result = comparator
            .compare_snapshot(snapshot(3, dec!(25)))
            .await
            .unwrap();
        assert!(result.previous.is_none());
        assert_eq!(result.absolute_delta, Decimal::ZERO);
        assert!(result.percentage_delta.is_none());
    }

    #[tokio::test]
    async fn deltas_are_taken_against_the_immediately_preceding_period() {
        let store = Arc::new(MemorySnapshotStore::new());
        store.upsert(snapshot(1, dec!(10))).await.unwrap();
        store.upsert(snapshot(2, dec!(20))).await.unwrap();
        let comparator = Comparator::new(store);

        let result = comparator
            .compare_snapshot(snapshot(3, dec!(25)))
            .await
            .unwrap();
        let previous = result.previous.unwrap();
        assert_eq!(previous.period.label(), "2025-02");
        assert_eq!(result.absolute_delta, dec!(5));
        assert_eq!(result.percentage_delta, Some(dec!(25)));
    }

    #[tokio::test]
    async fn zero_previous_value_has_no_percentage() {
        let store = Arc::new(MemorySnapshotStore::new());
        store.upsert(snapshot(2, dec!(0))).await.unwrap();
        let comparator = Comparator::new(store);

        let result = comparator
            .compare_snapshot(snapshot(3, dec!(25)))
            .await
            .unwrap();
        assert!(result.previous.is_some());
        assert_eq!(result.absolute_delta, dec!(25));
        assert!(result.percentage_delta.is_none());
    }
}
