use async_trait::async_trait;
use core_types::{Period, PropertyState};
use rust_decimal::Decimal;
use std::collections::HashMap;

mod error;
pub mod memory;
pub mod timeout;
pub mod types;

// --- Public API ---
pub use error::AccessorError;
pub use memory::InMemoryBusinessData;
pub use timeout::TimeoutAccessor;
pub use types::{
    BrokerStats, CommissionRecord, ModelFinancials, SoldRecord, StateFilter, StockSummary,
    SumField, TradeInStats,
};

/// The read-only query interface over the brokerage's business records.
///
/// This trait is the contract the KPI engine computes against, allowing the
/// underlying implementation (Postgres or in-memory fixtures) to be swapped
/// out. Every query is scoped to one `(segment, period)` and must tolerate
/// zero matching rows by returning `0` or an empty collection, never an
/// error. Period scoping follows the half-open convention `[start, end)` on
/// the record's creation or transition timestamp as documented per query.
#[async_trait]
pub trait BusinessData: Send + Sync {
    /// Counts property records matching the filter. `StateFilter::Any`
    /// counts records created or sold within the period; a state filter
    /// counts records created within it, except `Sold` which counts sales
    /// closed within it.
    async fn count_records(
        &self,
        segment: &str,
        period: Period,
        filter: StateFilter,
    ) -> Result<i64, AccessorError>;

    /// Sums a monetary column over the records selected by the filter, with
    /// the same period scoping rules as `count_records`.
    async fn sum_field(
        &self,
        segment: &str,
        period: Period,
        field: SumField,
        filter: StateFilter,
    ) -> Result<Decimal, AccessorError>;

    /// Creation and sale timestamps for every sale closed within the period.
    async fn list_sold_with_dates(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<SoldRecord>, AccessorError>;

    /// Counts of records touched by the period (created or sold within it),
    /// grouped by their current state. States with no records are absent
    /// from the map.
    async fn group_by_state(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<HashMap<PropertyState, i64>, AccessorError>;

    /// Commission amount and broker split for every sale closed within the
    /// period.
    async fn list_commissions(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<CommissionRecord>, AccessorError>;

    /// Current standing inventory (AVAILABLE or RESERVED), deliberately not
    /// period-bound: the stock index and total valuation measure what is on
    /// the books right now.
    async fn standing_stock(&self, segment: &str) -> Result<StockSummary, AccessorError>;

    /// Per-broker activity within the period: `assigned` counts the records
    /// the broker touched in it (created or sold), `sold` the subset sold.
    async fn broker_performance(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<BrokerStats>, AccessorError>;

    /// Trade-ins initiated and finalized within the period.
    async fn trade_in_counts(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<TradeInStats, AccessorError>;

    /// Revenue and cost aggregates over sales closed within the period.
    async fn model_financials(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<ModelFinancials, AccessorError>;
}
