use crate::enums::{AlertSeverity, MetricCode, Unit};
use crate::error::CoreError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A half-open time window `[start, end)` over which a KPI is computed.
///
/// The computation cycle always uses the current calendar month unless a
/// caller parameterizes it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CoreError> {
        if start >= end {
            return Err(CoreError::InvalidPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// The calendar month `[first day, first day of next month)` for a given
    /// year and 1-based month number.
    pub fn month(year: i32, month: u32) -> Result<Self, CoreError> {
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            CoreError::InvalidInput("month".to_string(), format!("{year}-{month:02}"))
        })?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        // from_ymd_opt cannot fail here: day 1 exists in every month.
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .ok_or_else(|| CoreError::InvalidInput("month".to_string(), format!("{year}-{month:02}")))?;
        Ok(Self {
            start: start.and_hms_opt(0, 0, 0).unwrap().and_utc(),
            end: end.and_hms_opt(0, 0, 0).unwrap().and_utc(),
        })
    }

    /// The calendar month containing the given instant.
    pub fn month_of(instant: DateTime<Utc>) -> Self {
        // The year/month of a valid timestamp always form a valid month.
        Self::month(instant.year(), instant.month()).unwrap()
    }

    /// The calendar month containing "now". This is the default cycle period.
    pub fn current_month() -> Self {
        Self::month_of(Utc::now())
    }

    /// Membership test using the half-open convention: `start` is inside,
    /// `end` is not.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// A short human-readable label, e.g. `2025-03` for a calendar month.
    pub fn label(&self) -> String {
        self.start.format("%Y-%m").to_string()
    }
}

/// One persisted, immutable KPI value for a given metric/segment/period.
///
/// Uniquely identified by `(metric_code, segment, period.start)`; recomputing
/// the same period overwrites the stored value rather than appending a
/// duplicate row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub id: Uuid,
    pub metric_code: MetricCode,
    /// The business-model scope this value was computed for.
    pub segment: String,
    pub period: Period,
    pub value: Decimal,
    pub unit: Unit,
    /// Supporting aggregates (counts, denominators, flags) for drill-down.
    pub metadata: JsonValue,
    pub computed_at: DateTime<Utc>,
}

impl KpiSnapshot {
    pub fn new(
        metric_code: MetricCode,
        segment: impl Into<String>,
        period: Period,
        value: Decimal,
        unit: Unit,
        metadata: JsonValue,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            metric_code,
            segment: segment.into(),
            period,
            value,
            unit,
            metadata,
            computed_at: Utc::now(),
        }
    }

    /// True when the calculator flagged this value as having no defined
    /// result (ROI with a zero cost basis).
    pub fn is_undefined(&self) -> bool {
        self.metadata
            .get("undefined")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }
}

/// The outcome of comparing a snapshot against the immediately preceding
/// period. Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub current: KpiSnapshot,
    pub previous: Option<KpiSnapshot>,
    /// `current.value - previous.value`; zero when there is no predecessor.
    pub absolute_delta: Decimal,
    /// Variation in percent of the previous value. `None` when there is no
    /// predecessor or its value was zero.
    pub percentage_delta: Option<Decimal>,
}

/// A threshold breach raised by the alert emitter.
///
/// Read and acknowledged by the notification surface; `period` participates
/// in the idempotency key so one breach per metric/segment/period stays open
/// at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub metric_code: MetricCode,
    pub segment: String,
    pub period: Period,
    pub severity: AlertSeverity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(
        metric_code: MetricCode,
        segment: impl Into<String>,
        period: Period,
        severity: AlertSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            metric_code,
            segment: segment.into(),
            period,
            severity,
            message: message.into(),
            triggered_at: Utc::now(),
            acknowledged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_is_half_open() {
        let period = Period::month(2025, 3).unwrap();
        assert!(period.contains(period.start));
        assert!(!period.contains(period.end));
        let inside = NaiveDate::from_ymd_opt(2025, 3, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();
        assert!(period.contains(inside));
    }

    #[test]
    fn december_rolls_over_to_january() {
        let period = Period::month(2025, 12).unwrap();
        assert_eq!(period.end.year(), 2026);
        assert_eq!(period.end.month(), 1);
        assert_eq!(period.label(), "2025-12");
    }

    #[test]
    fn degenerate_period_is_rejected() {
        let instant = Utc::now();
        assert!(Period::new(instant, instant).is_err());
    }

    #[test]
    fn undefined_flag_is_read_from_metadata() {
        let period = Period::month(2025, 3).unwrap();
        let snapshot = KpiSnapshot::new(
            MetricCode::RoiByModel,
            "resale",
            period,
            Decimal::ZERO,
            Unit::Percent,
            serde_json::json!({ "undefined": true }),
        );
        assert!(snapshot.is_undefined());
    }
}
