use crate::error::AccessorError;
use crate::types::{
    BrokerStats, CommissionRecord, ModelFinancials, SoldRecord, StateFilter, StockSummary,
    SumField, TradeInStats,
};
use crate::BusinessData;
use async_trait::async_trait;
use core_types::{Period, PropertyState};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Bounds every query of an inner `BusinessData` with a deadline.
///
/// A query that exceeds the deadline surfaces as `AccessorError::Timeout`,
/// which the cycle records as a partial failure for that metric and moves on.
pub struct TimeoutAccessor {
    inner: Arc<dyn BusinessData>,
    deadline: Duration,
}

impl TimeoutAccessor {
    pub fn new(inner: Arc<dyn BusinessData>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    async fn bounded<T, F>(&self, query: &str, fut: F) -> Result<T, AccessorError>
    where
        F: Future<Output = Result<T, AccessorError>>,
    {
        match tokio::time::timeout(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(query, deadline_ms = self.deadline.as_millis() as u64, "Business data query timed out.");
                Err(AccessorError::Timeout(query.to_string()))
            }
        }
    }
}

#[async_trait]
impl BusinessData for TimeoutAccessor {
    async fn count_records(
        &self,
        segment: &str,
        period: Period,
        filter: StateFilter,
    ) -> Result<i64, AccessorError> {
        self.bounded("count_records", self.inner.count_records(segment, period, filter))
            .await
    }

    async fn sum_field(
        &self,
        segment: &str,
        period: Period,
        field: SumField,
        filter: StateFilter,
    ) -> Result<Decimal, AccessorError> {
        self.bounded("sum_field", self.inner.sum_field(segment, period, field, filter))
            .await
    }

    async fn list_sold_with_dates(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<SoldRecord>, AccessorError> {
        self.bounded(
            "list_sold_with_dates",
            self.inner.list_sold_with_dates(segment, period),
        )
        .await
    }

    async fn group_by_state(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<HashMap<PropertyState, i64>, AccessorError> {
        self.bounded("group_by_state", self.inner.group_by_state(segment, period))
            .await
    }

    async fn list_commissions(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<CommissionRecord>, AccessorError> {
        self.bounded("list_commissions", self.inner.list_commissions(segment, period))
            .await
    }

    async fn standing_stock(&self, segment: &str) -> Result<StockSummary, AccessorError> {
        self.bounded("standing_stock", self.inner.standing_stock(segment))
            .await
    }

    async fn broker_performance(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<BrokerStats>, AccessorError> {
        self.bounded(
            "broker_performance",
            self.inner.broker_performance(segment, period),
        )
        .await
    }

    async fn trade_in_counts(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<TradeInStats, AccessorError> {
        self.bounded("trade_in_counts", self.inner.trade_in_counts(segment, period))
            .await
    }

    async fn model_financials(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<ModelFinancials, AccessorError> {
        self.bounded("model_financials", self.inner.model_financials(segment, period))
            .await
    }
}
