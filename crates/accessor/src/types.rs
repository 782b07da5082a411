use chrono::{DateTime, Utc};
use core_types::PropertyState;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Narrows a count or sum query to a property lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFilter {
    /// Every record touched by the period: created within it, or sold
    /// within it after being created earlier.
    Any,
    /// Records in the given state. For `Sold` the period applies to the sale
    /// timestamp; for every other state it applies to the creation timestamp.
    In(PropertyState),
}

/// The numeric columns the engine is allowed to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SumField {
    Price,
    CommissionAmount,
}

/// Creation and sale timestamps of a property sold within the query period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoldRecord {
    pub created_at: DateTime<Utc>,
    pub sold_at: DateTime<Utc>,
}

/// One commission line for a sale closed within the query period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub amount: Decimal,
    /// Fraction of the commission owed to the broker, in `[0, 1]`.
    pub broker_split_pct: Decimal,
}

/// Current standing inventory of a segment: properties in AVAILABLE or
/// RESERVED state, regardless of when they were created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSummary {
    pub count: i64,
    pub total_value: Decimal,
}

/// Per-broker assignment and sale counts within the query period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerStats {
    pub broker_id: String,
    pub assigned: i64,
    pub sold: i64,
}

/// Trade-in negotiations touched within the query period.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TradeInStats {
    pub initiated: i64,
    pub finalized: i64,
}

/// Revenue and cost aggregates for ROI, both over sales closed within the
/// query period.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelFinancials {
    pub revenue: Decimal,
    pub cost: Decimal,
}
