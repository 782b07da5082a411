use crate::error::IndicatorError;
use crate::outcome::{KpiValue, MetricOutcome};
use crate::registry::MetricRegistry;
use accessor::{BusinessData, StateFilter, SumField};
use configuration::SegmentSettings;
use core_types::{MetricCode, Period, PropertyState, Unit};
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

/// A stateless calculator deriving the KPI catalog from business records.
///
/// One method per metric code; every method reads through the injected
/// `BusinessData` contract, so identical underlying data always yields
/// identical values.
pub struct IndicatorEngine {
    registry: MetricRegistry,
    business_data: Arc<dyn BusinessData>,
    segments: Vec<SegmentSettings>,
}

impl IndicatorEngine {
    pub fn new(business_data: Arc<dyn BusinessData>, segments: Vec<SegmentSettings>) -> Self {
        Self {
            registry: MetricRegistry::standard(),
            business_data,
            segments,
        }
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Runs every registered calculator in catalog order. A single
    /// calculator's failure is recorded as an outcome and the remaining
    /// calculators still execute.
    pub async fn compute_all(&self, segment: &str, period: Period) -> Vec<MetricOutcome> {
        let mut outcomes = Vec::with_capacity(self.registry.all().len());
        for definition in self.registry.all() {
            let result = self.compute(definition.code, segment, period).await;
            if let Err(error) = &result {
                tracing::error!(
                    metric = %definition.code,
                    segment,
                    error = %error,
                    "KPI calculation failed; continuing with the rest of the batch."
                );
            }
            outcomes.push(MetricOutcome {
                code: definition.code,
                result,
            });
        }
        outcomes
    }

    /// Computes a single metric for one segment and period.
    pub async fn compute(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<KpiValue, IndicatorError> {
        match code {
            MetricCode::ConversionRate => self.conversion_rate(segment, period).await,
            MetricCode::AvgTimeToSale => self.avg_time_to_sale(segment, period).await,
            MetricCode::TotalValuation => self.total_valuation(segment).await,
            MetricCode::GrossCommission => self.gross_commission(segment, period).await,
            MetricCode::NetCommission => self.net_commission(segment, period).await,
            MetricCode::StockIndex => self.stock_index(segment).await,
            MetricCode::BrokerEfficiency => self.broker_efficiency(segment, period).await,
            MetricCode::TradeInSuccessRate => self.trade_in_success_rate(segment, period).await,
            MetricCode::RoiByModel => self.roi_by_model(segment, period).await,
        }
    }

    /// Sold records as a share of all records touched by the period.
    async fn conversion_rate(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<KpiValue, IndicatorError> {
        let sold = self
            .business_data
            .count_records(segment, period, StateFilter::In(PropertyState::Sold))
            .await?;
        let total = self
            .business_data
            .count_records(segment, period, StateFilter::Any)
            .await?;
        // State distribution rides along for dashboard drill-down.
        let by_state: std::collections::BTreeMap<&str, i64> = self
            .business_data
            .group_by_state(segment, period)
            .await?
            .into_iter()
            .map(|(state, count)| (state.as_str(), count))
            .collect();
        Ok(KpiValue::new(
            share_pct(sold, total),
            Unit::Percent,
            json!({ "sold": sold, "total": total, "by_state": by_state }),
        ))
    }

    /// Mean days between listing and sale over the period's sales, with the
    /// fractional part truncated (floor), never rounded up.
    async fn avg_time_to_sale(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<KpiValue, IndicatorError> {
        let sold = self
            .business_data
            .list_sold_with_dates(segment, period)
            .await?;
        let value = if sold.is_empty() {
            Decimal::ZERO
        } else {
            let total_days: i64 = sold
                .iter()
                .map(|r| (r.sold_at - r.created_at).num_days())
                .sum();
            (Decimal::from(total_days) / Decimal::from(sold.len() as i64)).floor()
        };
        Ok(KpiValue::new(
            value,
            Unit::Days,
            json!({ "sold_count": sold.len() }),
        ))
    }

    /// Value of the standing inventory (AVAILABLE and RESERVED), regardless
    /// of creation period.
    async fn total_valuation(&self, segment: &str) -> Result<KpiValue, IndicatorError> {
        let stock = self.business_data.standing_stock(segment).await?;
        Ok(KpiValue::new(
            stock.total_value,
            Unit::Currency,
            json!({ "standing_count": stock.count }),
        ))
    }

    /// Commission booked on sales closed within the period.
    async fn gross_commission(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<KpiValue, IndicatorError> {
        let total = self
            .business_data
            .sum_field(
                segment,
                period,
                SumField::CommissionAmount,
                StateFilter::In(PropertyState::Sold),
            )
            .await?;
        let sales_volume = self
            .business_data
            .sum_field(
                segment,
                period,
                SumField::Price,
                StateFilter::In(PropertyState::Sold),
            )
            .await?;
        Ok(KpiValue::new(
            total,
            Unit::Currency,
            json!({ "sales_volume": sales_volume }),
        ))
    }

    /// Gross commission minus each sale's broker split.
    async fn net_commission(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<KpiValue, IndicatorError> {
        let commissions = self
            .business_data
            .list_commissions(segment, period)
            .await?;
        let net: Decimal = commissions
            .iter()
            .map(|c| c.amount * (Decimal::ONE - c.broker_split_pct))
            .sum();
        Ok(KpiValue::new(
            net,
            Unit::Currency,
            json!({ "commission_count": commissions.len() }),
        ))
    }

    /// Standing stock as a share of the segment's configured target, where
    /// 100 means "on target". A missing segment entry is a configuration
    /// error; a target of zero or less yields 0.
    async fn stock_index(&self, segment: &str) -> Result<KpiValue, IndicatorError> {
        let settings = self
            .segments
            .iter()
            .find(|s| s.code == segment)
            .ok_or_else(|| {
                IndicatorError::Configuration(format!(
                    "no configuration for segment '{segment}'"
                ))
            })?;
        let target = settings.target_stock_or_default();
        let stock = self.business_data.standing_stock(segment).await?;
        let value = if target <= 0 {
            Decimal::ZERO
        } else {
            Decimal::from(stock.count) / Decimal::from(target) * Decimal::ONE_HUNDRED
        };
        Ok(KpiValue::new(
            value,
            Unit::Index,
            json!({ "current_stock": stock.count, "target_stock": target }),
        ))
    }

    /// Mean of per-broker sale rates over the period. A broker with zero
    /// assignments contributes 0 rather than failing the aggregate.
    async fn broker_efficiency(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<KpiValue, IndicatorError> {
        let brokers = self
            .business_data
            .broker_performance(segment, period)
            .await?;
        let value = if brokers.is_empty() {
            Decimal::ZERO
        } else {
            let total: Decimal = brokers
                .iter()
                .map(|b| share_pct(b.sold, b.assigned))
                .sum();
            total / Decimal::from(brokers.len() as i64)
        };
        Ok(KpiValue::new(
            value,
            Unit::Percent,
            json!({ "broker_count": brokers.len() }),
        ))
    }

    /// Finalized trade-ins as a share of those initiated within the period.
    async fn trade_in_success_rate(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<KpiValue, IndicatorError> {
        let stats = self
            .business_data
            .trade_in_counts(segment, period)
            .await?;
        Ok(KpiValue::new(
            share_pct(stats.finalized, stats.initiated),
            Unit::Percent,
            json!({ "initiated": stats.initiated, "finalized": stats.finalized }),
        ))
    }

    /// `(revenue - cost) / cost * 100`. Unlike every other ratio, a zero
    /// cost basis does not collapse to 0: there is no return to measure, so
    /// the value is flagged undefined instead.
    async fn roi_by_model(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<KpiValue, IndicatorError> {
        let financials = self
            .business_data
            .model_financials(segment, period)
            .await?;
        let metadata = json!({
            "revenue": financials.revenue,
            "cost": financials.cost,
        });
        if financials.cost.is_zero() {
            return Ok(KpiValue::undefined(Unit::Percent, metadata));
        }
        let value =
            (financials.revenue - financials.cost) / financials.cost * Decimal::ONE_HUNDRED;
        Ok(KpiValue::new(value, Unit::Percent, metadata))
    }
}

/// `numerator / denominator * 100`, defined as 0 when the denominator is 0.
fn share_pct(numerator: i64, denominator: i64) -> Decimal {
    if denominator == 0 {
        Decimal::ZERO
    } else {
        Decimal::from(numerator) / Decimal::from(denominator) * Decimal::ONE_HUNDRED
    }
}
