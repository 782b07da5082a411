use core_types::{MetricCode, Unit};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// One entry of the KPI catalog: identity, unit, and the optional alert
/// thresholds. Immutable at runtime; built once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct MetricDefinition {
    pub code: MetricCode,
    pub name: &'static str,
    pub unit: Unit,
    /// A snapshot value below this raises an alert.
    pub min_threshold: Option<Decimal>,
    /// A snapshot value above this raises an alert.
    pub max_threshold: Option<Decimal>,
}

/// The ordered, immutable catalog of the nine business indicators.
///
/// The catalog order is the order `compute_all` runs the calculators in and
/// the order dashboards list metrics in.
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    definitions: Vec<MetricDefinition>,
}

impl MetricRegistry {
    /// Builds the standard catalog with the brokerage's default thresholds.
    /// Metrics without thresholds never alert.
    pub fn standard() -> Self {
        let definitions = vec![
            MetricDefinition {
                code: MetricCode::ConversionRate,
                name: "Conversion rate",
                unit: Unit::Percent,
                min_threshold: Some(dec!(5)),
                max_threshold: None,
            },
            MetricDefinition {
                code: MetricCode::AvgTimeToSale,
                name: "Average time to sale",
                unit: Unit::Days,
                min_threshold: None,
                max_threshold: Some(dec!(90)),
            },
            MetricDefinition {
                code: MetricCode::TotalValuation,
                name: "Total valuation",
                unit: Unit::Currency,
                min_threshold: None,
                max_threshold: None,
            },
            MetricDefinition {
                code: MetricCode::GrossCommission,
                name: "Gross commission",
                unit: Unit::Currency,
                min_threshold: None,
                max_threshold: None,
            },
            MetricDefinition {
                code: MetricCode::NetCommission,
                name: "Net commission",
                unit: Unit::Currency,
                min_threshold: None,
                max_threshold: None,
            },
            MetricDefinition {
                code: MetricCode::StockIndex,
                name: "Stock index",
                unit: Unit::Index,
                min_threshold: Some(dec!(40)),
                max_threshold: Some(dec!(150)),
            },
            MetricDefinition {
                code: MetricCode::BrokerEfficiency,
                name: "Broker efficiency",
                unit: Unit::Percent,
                min_threshold: Some(dec!(10)),
                max_threshold: None,
            },
            MetricDefinition {
                code: MetricCode::TradeInSuccessRate,
                name: "Trade-in success rate",
                unit: Unit::Percent,
                min_threshold: Some(dec!(20)),
                max_threshold: None,
            },
            MetricDefinition {
                code: MetricCode::RoiByModel,
                name: "ROI by model",
                unit: Unit::Percent,
                min_threshold: None,
                max_threshold: None,
            },
        ];
        Self { definitions }
    }

    /// Looks up a definition by code. The catalog covers every `MetricCode`
    /// variant, so this never misses.
    pub fn get(&self, code: MetricCode) -> &MetricDefinition {
        self.definitions
            .iter()
            .find(|d| d.code == code)
            .expect("standard catalog covers every metric code")
    }

    /// The definitions in catalog order.
    pub fn all(&self) -> &[MetricDefinition] {
        &self.definitions
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_code_in_order() {
        let registry = MetricRegistry::standard();
        let codes: Vec<MetricCode> = registry.all().iter().map(|d| d.code).collect();
        assert_eq!(codes, MetricCode::ALL.to_vec());
    }

    #[test]
    fn get_is_total_over_the_code_enum() {
        let registry = MetricRegistry::standard();
        for code in MetricCode::ALL {
            assert_eq!(registry.get(code).code, code);
        }
    }

    #[test]
    fn ratio_metrics_are_expressed_in_percent() {
        let registry = MetricRegistry::standard();
        for code in [
            MetricCode::ConversionRate,
            MetricCode::BrokerEfficiency,
            MetricCode::TradeInSuccessRate,
            MetricCode::RoiByModel,
        ] {
            assert_eq!(registry.get(code).unit, Unit::Percent);
        }
    }
}
