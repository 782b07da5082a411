use crate::error::AccessorError;
use crate::types::{
    BrokerStats, CommissionRecord, ModelFinancials, SoldRecord, StateFilter, StockSummary,
    SumField, TradeInStats,
};
use crate::BusinessData;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use core_types::{Period, PropertyState, TradeInState};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// One property listing held in memory.
#[derive(Debug, Clone)]
pub struct PropertyRecord {
    pub segment: String,
    pub state: PropertyState,
    pub price: Decimal,
    /// Acquisition cost basis, used by the ROI aggregates.
    pub acquisition_cost: Decimal,
    pub commission_amount: Decimal,
    /// Fraction of the commission owed to the broker, in `[0, 1]`.
    pub broker_split_pct: Decimal,
    pub broker_id: String,
    pub created_at: DateTime<Utc>,
    pub sold_at: Option<DateTime<Utc>>,
}

/// One trade-in negotiation held in memory.
#[derive(Debug, Clone)]
pub struct TradeInRecord {
    pub segment: String,
    pub state: TradeInState,
    pub initiated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

/// A fixture-backed implementation of `BusinessData`.
///
/// Serves the test suites and the `demo` CLI path, mirroring how the live
/// Postgres accessor answers the same queries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBusinessData {
    properties: Vec<PropertyRecord>,
    trade_ins: Vec<TradeInRecord>,
}

impl InMemoryBusinessData {
    pub fn new(properties: Vec<PropertyRecord>, trade_ins: Vec<TradeInRecord>) -> Self {
        Self {
            properties,
            trade_ins,
        }
    }

    /// A deterministic demo portfolio spread over two segments, anchored on
    /// the current month so a default cycle finds data.
    pub fn demo() -> Self {
        let now = Utc::now();
        let day = |d: i64| now - Duration::days(d);

        let mut properties = Vec::new();

        // Resale segment: 20 listings, 5 sold this month with a spread of
        // time-to-sale values, the rest split across the other states.
        for i in 0..20i64 {
            let sold = i < 5;
            let time_to_sale = 10 * (i + 1); // 10, 20, 30, 40, 50 days for the sold ones
            properties.push(PropertyRecord {
                segment: "resale".to_string(),
                state: if sold {
                    PropertyState::Sold
                } else if i % 3 == 0 {
                    PropertyState::Reserved
                } else {
                    PropertyState::Available
                },
                price: dec!(250_000) + Decimal::from(i * 10_000),
                acquisition_cost: dec!(200_000),
                commission_amount: dec!(7_500),
                broker_split_pct: if i % 2 == 0 { dec!(0.4) } else { dec!(0.5) },
                broker_id: format!("broker-{}", i % 4),
                created_at: if sold { day(time_to_sale) } else { day(3) },
                sold_at: sold.then(|| day(0)),
            });
        }

        // New-build segment: smaller book, no recorded cost basis, so ROI
        // comes back flagged undefined.
        for i in 0..8i64 {
            let sold = i < 2;
            properties.push(PropertyRecord {
                segment: "new_build".to_string(),
                state: if sold {
                    PropertyState::Sold
                } else {
                    PropertyState::Available
                },
                price: dec!(380_000) + Decimal::from(i * 15_000),
                acquisition_cost: Decimal::ZERO,
                commission_amount: dec!(11_000),
                broker_split_pct: dec!(0.45),
                broker_id: format!("broker-{}", i % 2),
                created_at: day(12 + i),
                sold_at: sold.then(|| day(1)),
            });
        }

        let trade_ins = vec![
            TradeInRecord {
                segment: "resale".to_string(),
                state: TradeInState::Finalized,
                initiated_at: day(20),
                finalized_at: Some(day(2)),
            },
            TradeInRecord {
                segment: "resale".to_string(),
                state: TradeInState::Appraised,
                initiated_at: day(9),
                finalized_at: None,
            },
            TradeInRecord {
                segment: "resale".to_string(),
                state: TradeInState::Rejected,
                initiated_at: day(15),
                finalized_at: None,
            },
        ];

        Self::new(properties, trade_ins)
    }

    fn matches(&self, record: &PropertyRecord, period: Period, filter: StateFilter) -> bool {
        match filter {
            // A record belongs to the period when it was created in it or
            // transitioned (sold) in it.
            StateFilter::Any => {
                period.contains(record.created_at)
                    || record.sold_at.map(|t| period.contains(t)).unwrap_or(false)
            }
            StateFilter::In(PropertyState::Sold) => {
                record.state == PropertyState::Sold
                    && record.sold_at.map(|t| period.contains(t)).unwrap_or(false)
            }
            StateFilter::In(state) => {
                record.state == state && period.contains(record.created_at)
            }
        }
    }

    fn selected<'a>(
        &'a self,
        segment: &'a str,
        period: Period,
        filter: StateFilter,
    ) -> impl Iterator<Item = &'a PropertyRecord> {
        self.properties
            .iter()
            .filter(move |r| r.segment == segment && self.matches(r, period, filter))
    }
}

#[async_trait]
impl BusinessData for InMemoryBusinessData {
    async fn count_records(
        &self,
        segment: &str,
        period: Period,
        filter: StateFilter,
    ) -> Result<i64, AccessorError> {
        Ok(self.selected(segment, period, filter).count() as i64)
    }

    async fn sum_field(
        &self,
        segment: &str,
        period: Period,
        field: SumField,
        filter: StateFilter,
    ) -> Result<Decimal, AccessorError> {
        Ok(self
            .selected(segment, period, filter)
            .map(|r| match field {
                SumField::Price => r.price,
                SumField::CommissionAmount => r.commission_amount,
            })
            .sum())
    }

    async fn list_sold_with_dates(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<SoldRecord>, AccessorError> {
        Ok(self
            .selected(segment, period, StateFilter::In(PropertyState::Sold))
            .map(|r| SoldRecord {
                created_at: r.created_at,
                // `matches` only passes sold records with a sale timestamp.
                sold_at: r.sold_at.unwrap(),
            })
            .collect())
    }

    async fn group_by_state(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<HashMap<PropertyState, i64>, AccessorError> {
        let mut counts = HashMap::new();
        for record in self.selected(segment, period, StateFilter::Any) {
            *counts.entry(record.state).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn list_commissions(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<CommissionRecord>, AccessorError> {
        Ok(self
            .selected(segment, period, StateFilter::In(PropertyState::Sold))
            .map(|r| CommissionRecord {
                amount: r.commission_amount,
                broker_split_pct: r.broker_split_pct,
            })
            .collect())
    }

    async fn standing_stock(&self, segment: &str) -> Result<StockSummary, AccessorError> {
        let standing = self.properties.iter().filter(|r| {
            r.segment == segment
                && matches!(r.state, PropertyState::Available | PropertyState::Reserved)
        });
        let mut summary = StockSummary {
            count: 0,
            total_value: Decimal::ZERO,
        };
        for record in standing {
            summary.count += 1;
            summary.total_value += record.price;
        }
        Ok(summary)
    }

    async fn broker_performance(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<BrokerStats>, AccessorError> {
        let mut by_broker: HashMap<String, BrokerStats> = HashMap::new();
        for record in self
            .properties
            .iter()
            .filter(|r| r.segment == segment && self.matches(r, period, StateFilter::Any))
        {
            let entry = by_broker
                .entry(record.broker_id.clone())
                .or_insert_with(|| BrokerStats {
                    broker_id: record.broker_id.clone(),
                    assigned: 0,
                    sold: 0,
                });
            let sold_in_period = record.sold_at.map(|t| period.contains(t)).unwrap_or(false);
            // Assignment counts every record the broker touched in the
            // period, so a broker's sales can never exceed assignments.
            if period.contains(record.created_at) || sold_in_period {
                entry.assigned += 1;
            }
            if sold_in_period {
                entry.sold += 1;
            }
        }
        let mut stats: Vec<BrokerStats> = by_broker.into_values().collect();
        stats.sort_by(|a, b| a.broker_id.cmp(&b.broker_id));
        Ok(stats)
    }

    async fn trade_in_counts(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<TradeInStats, AccessorError> {
        let mut stats = TradeInStats::default();
        for record in self.trade_ins.iter().filter(|r| r.segment == segment) {
            if period.contains(record.initiated_at) {
                stats.initiated += 1;
            }
            if record
                .finalized_at
                .map(|t| period.contains(t))
                .unwrap_or(false)
            {
                stats.finalized += 1;
            }
        }
        Ok(stats)
    }

    async fn model_financials(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<ModelFinancials, AccessorError> {
        let mut financials = ModelFinancials::default();
        for record in self.selected(segment, period, StateFilter::In(PropertyState::Sold)) {
            financials.revenue += record.price;
            financials.cost += record.acquisition_cost;
        }
        Ok(financials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(segment: &str, state: PropertyState, created: DateTime<Utc>) -> PropertyRecord {
        PropertyRecord {
            segment: segment.to_string(),
            state,
            price: dec!(100_000),
            acquisition_cost: dec!(80_000),
            commission_amount: dec!(3_000),
            broker_split_pct: dec!(0.5),
            broker_id: "broker-0".to_string(),
            created_at: created,
            sold_at: None,
        }
    }

    fn march() -> Period {
        Period::month(2025, 3).unwrap()
    }

    #[tokio::test]
    async fn counts_respect_half_open_period() {
        let period = march();
        let data = InMemoryBusinessData::new(
            vec![
                property("resale", PropertyState::Available, period.start),
                // Created exactly at the period end belongs to the next month.
                property("resale", PropertyState::Available, period.end),
            ],
            vec![],
        );
        let count = data
            .count_records("resale", period, StateFilter::Any)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn empty_segment_yields_zeroes_not_errors() {
        let data = InMemoryBusinessData::default();
        let period = march();
        assert_eq!(
            data.count_records("resale", period, StateFilter::Any)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            data.sum_field("resale", period, SumField::Price, StateFilter::Any)
                .await
                .unwrap(),
            Decimal::ZERO
        );
        assert!(data
            .list_sold_with_dates("resale", period)
            .await
            .unwrap()
            .is_empty());
        let stock = data.standing_stock("resale").await.unwrap();
        assert_eq!(stock.count, 0);
    }

    #[tokio::test]
    async fn standing_stock_ignores_the_period() {
        let old = march().start - Duration::days(400);
        let data = InMemoryBusinessData::new(
            vec![
                property("resale", PropertyState::Available, old),
                property("resale", PropertyState::Reserved, old),
                property("resale", PropertyState::Withdrawn, old),
            ],
            vec![],
        );
        let stock = data.standing_stock("resale").await.unwrap();
        assert_eq!(stock.count, 2);
        assert_eq!(stock.total_value, dec!(200_000));
    }

    #[tokio::test]
    async fn group_by_state_covers_records_touched_by_the_period() {
        let period = march();
        let mut sold = property("resale", PropertyState::Sold, period.start - Duration::days(30));
        sold.sold_at = Some(period.start + Duration::days(2));
        let data = InMemoryBusinessData::new(
            vec![
                property("resale", PropertyState::Available, period.start),
                property("resale", PropertyState::Available, period.start + Duration::days(1)),
                property("resale", PropertyState::Reserved, period.start + Duration::days(2)),
                sold,
            ],
            vec![],
        );

        let counts = data.group_by_state("resale", period).await.unwrap();
        assert_eq!(counts.get(&PropertyState::Available), Some(&2));
        assert_eq!(counts.get(&PropertyState::Reserved), Some(&1));
        assert_eq!(counts.get(&PropertyState::Sold), Some(&1));
        assert_eq!(counts.get(&PropertyState::Withdrawn), None);
    }

    #[tokio::test]
    async fn sold_filter_uses_the_sale_timestamp() {
        let period = march();
        let mut sold_earlier = property("resale", PropertyState::Sold, period.start);
        sold_earlier.sold_at = Some(period.start - Duration::days(10));
        let mut sold_in_period = property(
            "resale",
            PropertyState::Sold,
            period.start - Duration::days(40),
        );
        sold_in_period.sold_at = Some(period.start + Duration::days(5));
        let data = InMemoryBusinessData::new(vec![sold_earlier, sold_in_period], vec![]);

        let count = data
            .count_records("resale", period, StateFilter::In(PropertyState::Sold))
            .await
            .unwrap();
        assert_eq!(count, 1);
        let sold = data.list_sold_with_dates("resale", period).await.unwrap();
        assert_eq!(sold.len(), 1);
        assert_eq!(
            (sold[0].sold_at - sold[0].created_at).num_days(),
            45
        );
    }
}
