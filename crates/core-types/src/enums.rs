use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed catalog of KPI codes computed by the engine.
///
/// The string form (`as_str`) is the stable identifier persisted to the
/// database and used in configuration and CLI arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCode {
    ConversionRate,
    AvgTimeToSale,
    TotalValuation,
    GrossCommission,
    NetCommission,
    StockIndex,
    BrokerEfficiency,
    TradeInSuccessRate,
    RoiByModel,
}

impl MetricCode {
    /// Every code, in catalog order. The registry iterates this list, so the
    /// order here is the order snapshots are computed in.
    pub const ALL: [MetricCode; 9] = [
        MetricCode::ConversionRate,
        MetricCode::AvgTimeToSale,
        MetricCode::TotalValuation,
        MetricCode::GrossCommission,
        MetricCode::NetCommission,
        MetricCode::StockIndex,
        MetricCode::BrokerEfficiency,
        MetricCode::TradeInSuccessRate,
        MetricCode::RoiByModel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCode::ConversionRate => "conversion_rate",
            MetricCode::AvgTimeToSale => "avg_time_to_sale",
            MetricCode::TotalValuation => "total_valuation",
            MetricCode::GrossCommission => "gross_commission",
            MetricCode::NetCommission => "net_commission",
            MetricCode::StockIndex => "stock_index",
            MetricCode::BrokerEfficiency => "broker_efficiency",
            MetricCode::TradeInSuccessRate => "trade_in_success_rate",
            MetricCode::RoiByModel => "roi_by_model",
        }
    }
}

impl fmt::Display for MetricCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricCode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| CoreError::UnknownMetric(s.to_string()))
    }
}

/// The unit a KPI value is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// A ratio expressed in percent, expected to stay within [0, 100].
    Percent,
    /// A whole number of days.
    Days,
    /// A monetary amount in the brokerage's accounting currency.
    Currency,
    /// A dimensionless index where 100 means "on target"; may exceed 100.
    Index,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Percent => "%",
            Unit::Days => "days",
            Unit::Currency => "EUR",
            Unit::Index => "index",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "%" => Ok(Unit::Percent),
            "days" => Ok(Unit::Days),
            "EUR" => Ok(Unit::Currency),
            "index" => Ok(Unit::Index),
            other => Err(CoreError::InvalidInput(
                "unit".to_string(),
                other.to_string(),
            )),
        }
    }
}

/// Lifecycle state of a property listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyState {
    Available,
    Reserved,
    Sold,
    Withdrawn,
}

impl PropertyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyState::Available => "AVAILABLE",
            PropertyState::Reserved => "RESERVED",
            PropertyState::Sold => "SOLD",
            PropertyState::Withdrawn => "WITHDRAWN",
        }
    }
}

impl FromStr for PropertyState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(PropertyState::Available),
            "RESERVED" => Ok(PropertyState::Reserved),
            "SOLD" => Ok(PropertyState::Sold),
            "WITHDRAWN" => Ok(PropertyState::Withdrawn),
            other => Err(CoreError::InvalidInput(
                "property state".to_string(),
                other.to_string(),
            )),
        }
    }
}

/// Lifecycle state of a trade-in negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeInState {
    Initiated,
    Appraised,
    Finalized,
    Rejected,
}

impl TradeInState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeInState::Initiated => "INITIATED",
            TradeInState::Appraised => "APPRAISED",
            TradeInState::Finalized => "FINALIZED",
            TradeInState::Rejected => "REJECTED",
        }
    }
}

/// How far outside the configured range a snapshot value landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(AlertSeverity::Warning),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(CoreError::InvalidInput(
                "severity".to_string(),
                other.to_string(),
            )),
        }
    }
}
