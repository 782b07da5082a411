use crate::error::IndicatorError;
use core_types::{MetricCode, Unit};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// The result of one calculator run: the value, its unit, and the supporting
/// aggregates that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiValue {
    pub value: Decimal,
    pub unit: Unit,
    pub metadata: JsonValue,
}

impl KpiValue {
    pub fn new(value: Decimal, unit: Unit, metadata: JsonValue) -> Self {
        Self {
            value,
            unit,
            metadata,
        }
    }

    /// A value with no defined result (ROI over a zero cost basis). The
    /// numeric value is zero but the flag tells consumers not to read it as
    /// "zero return".
    pub fn undefined(unit: Unit, metadata: JsonValue) -> Self {
        let mut metadata = metadata;
        if let Some(map) = metadata.as_object_mut() {
            map.insert("undefined".to_string(), JsonValue::Bool(true));
        }
        Self {
            value: Decimal::ZERO,
            unit,
            metadata,
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.metadata
            .get("undefined")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }
}

/// One entry of a `compute_all` batch: the metric and either its value or
/// the failure that was recorded for it. A failed metric never aborts the
/// rest of the batch.
#[derive(Debug)]
pub struct MetricOutcome {
    pub code: MetricCode,
    pub result: Result<KpiValue, IndicatorError>,
}

impl MetricOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
