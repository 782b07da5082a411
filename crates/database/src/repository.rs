use accessor::{
    AccessorError, BrokerStats, BusinessData, CommissionRecord, ModelFinancials, SoldRecord,
    StateFilter, StockSummary, SumField, TradeInStats,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Alert, AlertSeverity, KpiSnapshot, MetricCode, Period, PropertyState, Unit};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use std::collections::HashMap;
use store::{AlertSink, SnapshotStore, StoreError};
use uuid::Uuid;

/// The live persistence layer for KPI snapshots and alerts.
///
/// Owns the `kpi_snapshots` and `kpi_alerts` tables; the upsert's
/// `ON CONFLICT` clause is what serializes concurrent writes for the same
/// `(metric_code, segment, period_start)` key.
#[derive(Debug, Clone)]
pub struct PgKpiStore {
    pool: PgPool,
}

impl PgKpiStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// A row of the `kpi_snapshots` table.
#[derive(Debug, Clone, FromRow)]
struct SnapshotRow {
    id: Uuid,
    metric_code: String,
    segment: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    value: Decimal,
    unit: String,
    metadata: JsonValue,
    computed_at: DateTime<Utc>,
}

impl SnapshotRow {
    fn into_domain(self) -> Result<KpiSnapshot, StoreError> {
        let metric_code: MetricCode = self
            .metric_code
            .parse()
            .map_err(|e| StoreError::Lookup(format!("corrupt snapshot row: {e}")))?;
        let unit: Unit = self
            .unit
            .parse()
            .map_err(|e| StoreError::Lookup(format!("corrupt snapshot row: {e}")))?;
        let period = Period::new(self.period_start, self.period_end)
            .map_err(|e| StoreError::Lookup(format!("corrupt snapshot row: {e}")))?;
        Ok(KpiSnapshot {
            id: self.id,
            metric_code,
            segment: self.segment,
            period,
            value: self.value,
            unit,
            metadata: self.metadata,
            computed_at: self.computed_at,
        })
    }
}

/// A row of the `kpi_alerts` table.
#[derive(Debug, Clone, FromRow)]
struct AlertRow {
    id: Uuid,
    metric_code: String,
    segment: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    severity: String,
    message: String,
    triggered_at: DateTime<Utc>,
    acknowledged: bool,
}

impl AlertRow {
    fn into_domain(self) -> Result<Alert, StoreError> {
        let metric_code: MetricCode = self
            .metric_code
            .parse()
            .map_err(|e| StoreError::Lookup(format!("corrupt alert row: {e}")))?;
        let severity: AlertSeverity = self
            .severity
            .parse()
            .map_err(|e| StoreError::Lookup(format!("corrupt alert row: {e}")))?;
        let period = Period::new(self.period_start, self.period_end)
            .map_err(|e| StoreError::Lookup(format!("corrupt alert row: {e}")))?;
        Ok(Alert {
            id: self.id,
            metric_code,
            segment: self.segment,
            period,
            severity,
            message: self.message,
            triggered_at: self.triggered_at,
            acknowledged: self.acknowledged,
        })
    }
}

#[async_trait]
impl SnapshotStore for PgKpiStore {
    async fn upsert(&self, snapshot: KpiSnapshot) -> Result<KpiSnapshot, StoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            INSERT INTO kpi_snapshots
                (id, metric_code, segment, period_start, period_end, value, unit, metadata, computed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (metric_code, segment, period_start) DO UPDATE SET
                period_end = EXCLUDED.period_end,
                value = EXCLUDED.value,
                unit = EXCLUDED.unit,
                metadata = EXCLUDED.metadata,
                computed_at = EXCLUDED.computed_at
            RETURNING id, metric_code, segment, period_start, period_end, value, unit, metadata, computed_at
            "#,
        )
        .bind(snapshot.id)
        .bind(snapshot.metric_code.as_str())
        .bind(&snapshot.segment)
        .bind(snapshot.period.start)
        .bind(snapshot.period.end)
        .bind(snapshot.value)
        .bind(snapshot.unit.as_str())
        .bind(&snapshot.metadata)
        .bind(snapshot.computed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;

        row.into_domain()
    }

    async fn find(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<Option<KpiSnapshot>, StoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, metric_code, segment, period_start, period_end, value, unit, metadata, computed_at
            FROM kpi_snapshots
            WHERE metric_code = $1 AND segment = $2 AND period_start = $3
            "#,
        )
        .bind(code.as_str())
        .bind(segment)
        .bind(period.start)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Lookup(e.to_string()))?;

        row.map(SnapshotRow::into_domain).transpose()
    }

    async fn latest_before(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<Option<KpiSnapshot>, StoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, metric_code, segment, period_start, period_end, value, unit, metadata, computed_at
            FROM kpi_snapshots
            WHERE metric_code = $1 AND segment = $2 AND period_start < $3
            ORDER BY period_start DESC
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .bind(segment)
        .bind(period.start)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Lookup(e.to_string()))?;

        row.map(SnapshotRow::into_domain).transpose()
    }

    async fn range(
        &self,
        code: MetricCode,
        segment: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<KpiSnapshot>, StoreError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT id, metric_code, segment, period_start, period_end, value, unit, metadata, computed_at
            FROM kpi_snapshots
            WHERE metric_code = $1 AND segment = $2 AND period_start >= $3 AND period_start < $4
            ORDER BY period_start ASC
            "#,
        )
        .bind(code.as_str())
        .bind(segment)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Lookup(e.to_string()))?;

        rows.into_iter().map(SnapshotRow::into_domain).collect()
    }
}

#[async_trait]
impl AlertSink for PgKpiStore {
    async fn insert(&self, alert: Alert) -> Result<Alert, StoreError> {
        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            INSERT INTO kpi_alerts
                (id, metric_code, segment, period_start, period_end, severity, message, triggered_at, acknowledged)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, metric_code, segment, period_start, period_end, severity, message, triggered_at, acknowledged
            "#,
        )
        .bind(alert.id)
        .bind(alert.metric_code.as_str())
        .bind(&alert.segment)
        .bind(alert.period.start)
        .bind(alert.period.end)
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(alert.triggered_at)
        .bind(alert.acknowledged)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Alert(e.to_string()))?;

        row.into_domain()
    }

    async fn has_open(
        &self,
        code: MetricCode,
        segment: &str,
        period: Period,
    ) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM kpi_alerts
                WHERE metric_code = $1 AND segment = $2 AND period_start = $3
                  AND NOT acknowledged
            )
            "#,
        )
        .bind(code.as_str())
        .bind(segment)
        .bind(period.start)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Alert(e.to_string()))?;

        Ok(exists)
    }
}

/// The live implementation of the read-only business data contract, backed
/// by the back office's `properties` and `trade_ins` tables.
///
/// Every query is a plain SELECT; this struct never mutates business rows.
#[derive(Debug, Clone)]
pub struct PgBusinessData {
    pool: PgPool,
}

impl PgBusinessData {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// The shared period-scoping predicates, kept in one place so every query
/// agrees on the half-open `[start, end)` convention.
const TOUCHED_IN_PERIOD: &str = "((p.created_at >= $2 AND p.created_at < $3) \
     OR (p.sold_at IS NOT NULL AND p.sold_at >= $2 AND p.sold_at < $3))";
const SOLD_IN_PERIOD: &str = "p.state = 'SOLD' AND p.sold_at >= $2 AND p.sold_at < $3";

fn filter_clause(filter: StateFilter) -> String {
    match filter {
        StateFilter::Any => TOUCHED_IN_PERIOD.to_string(),
        StateFilter::In(PropertyState::Sold) => SOLD_IN_PERIOD.to_string(),
        StateFilter::In(state) => format!(
            "p.state = '{}' AND p.created_at >= $2 AND p.created_at < $3",
            state.as_str()
        ),
    }
}

#[async_trait]
impl BusinessData for PgBusinessData {
    async fn count_records(
        &self,
        segment: &str,
        period: Period,
        filter: StateFilter,
    ) -> Result<i64, AccessorError> {
        let sql = format!(
            "SELECT COUNT(*) FROM properties p WHERE p.segment = $1 AND {}",
            filter_clause(filter)
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(segment)
            .bind(period.start)
            .bind(period.end)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AccessorError::Query(e.to_string()))
    }

    async fn sum_field(
        &self,
        segment: &str,
        period: Period,
        field: SumField,
        filter: StateFilter,
    ) -> Result<Decimal, AccessorError> {
        let column = match field {
            SumField::Price => "p.price",
            SumField::CommissionAmount => "p.commission_amount",
        };
        let sql = format!(
            "SELECT COALESCE(SUM({column}), 0) FROM properties p WHERE p.segment = $1 AND {}",
            filter_clause(filter)
        );
        sqlx::query_scalar::<_, Decimal>(&sql)
            .bind(segment)
            .bind(period.start)
            .bind(period.end)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AccessorError::Query(e.to_string()))
    }

    async fn list_sold_with_dates(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<SoldRecord>, AccessorError> {
        let sql = format!(
            "SELECT p.created_at, p.sold_at FROM properties p WHERE p.segment = $1 AND {SOLD_IN_PERIOD}"
        );
        let rows = sqlx::query_as::<_, (DateTime<Utc>, DateTime<Utc>)>(&sql)
            .bind(segment)
            .bind(period.start)
            .bind(period.end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AccessorError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(created_at, sold_at)| SoldRecord {
                created_at,
                sold_at,
            })
            .collect())
    }

    async fn group_by_state(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<HashMap<PropertyState, i64>, AccessorError> {
        let sql = format!(
            "SELECT p.state, COUNT(*) FROM properties p \
             WHERE p.segment = $1 AND {TOUCHED_IN_PERIOD} GROUP BY p.state"
        );
        let rows = sqlx::query_as::<_, (String, i64)>(&sql)
            .bind(segment)
            .bind(period.start)
            .bind(period.end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AccessorError::Query(e.to_string()))?;

        let mut counts = HashMap::new();
        for (state, count) in rows {
            match state.parse::<PropertyState>() {
                Ok(state) => {
                    counts.insert(state, count);
                }
                Err(_) => {
                    tracing::warn!(state, "Ignoring rows with an unrecognized property state.");
                }
            }
        }
        Ok(counts)
    }

    async fn list_commissions(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<CommissionRecord>, AccessorError> {
        let sql = format!(
            "SELECT p.commission_amount, p.broker_split_pct FROM properties p \
             WHERE p.segment = $1 AND {SOLD_IN_PERIOD}"
        );
        let rows = sqlx::query_as::<_, (Decimal, Decimal)>(&sql)
            .bind(segment)
            .bind(period.start)
            .bind(period.end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AccessorError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(amount, broker_split_pct)| CommissionRecord {
                amount,
                broker_split_pct,
            })
            .collect())
    }

    async fn standing_stock(&self, segment: &str) -> Result<StockSummary, AccessorError> {
        let (count, total_value) = sqlx::query_as::<_, (i64, Decimal)>(
            r#"
            SELECT COUNT(*), COALESCE(SUM(p.price), 0)
            FROM properties p
            WHERE p.segment = $1 AND p.state IN ('AVAILABLE', 'RESERVED')
            "#,
        )
        .bind(segment)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AccessorError::Query(e.to_string()))?;

        Ok(StockSummary { count, total_value })
    }

    async fn broker_performance(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<Vec<BrokerStats>, AccessorError> {
        // Assignment counts every record the broker touched in the period,
        // so sales can never exceed assignments.
        let sql = format!(
            "SELECT p.broker_id, \
                    COUNT(*) AS assigned, \
                    COUNT(*) FILTER (WHERE p.sold_at >= $2 AND p.sold_at < $3) AS sold \
             FROM properties p \
             WHERE p.segment = $1 AND {TOUCHED_IN_PERIOD} \
             GROUP BY p.broker_id ORDER BY p.broker_id"
        );
        let rows = sqlx::query_as::<_, (String, i64, i64)>(&sql)
            .bind(segment)
            .bind(period.start)
            .bind(period.end)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AccessorError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(broker_id, assigned, sold)| BrokerStats {
                broker_id,
                assigned,
                sold,
            })
            .collect())
    }

    async fn trade_in_counts(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<TradeInStats, AccessorError> {
        let (initiated, finalized) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT COUNT(*) FILTER (WHERE t.initiated_at >= $2 AND t.initiated_at < $3),
                   COUNT(*) FILTER (WHERE t.finalized_at >= $2 AND t.finalized_at < $3)
            FROM trade_ins t
            WHERE t.segment = $1
            "#,
        )
        .bind(segment)
        .bind(period.start)
        .bind(period.end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AccessorError::Query(e.to_string()))?;

        Ok(TradeInStats {
            initiated,
            finalized,
        })
    }

    async fn model_financials(
        &self,
        segment: &str,
        period: Period,
    ) -> Result<ModelFinancials, AccessorError> {
        let sql = format!(
            "SELECT COALESCE(SUM(p.price), 0), COALESCE(SUM(p.acquisition_cost), 0) \
             FROM properties p WHERE p.segment = $1 AND {SOLD_IN_PERIOD}"
        );
        let (revenue, cost) = sqlx::query_as::<_, (Decimal, Decimal)>(&sql)
            .bind(segment)
            .bind(period.start)
            .bind(period.end)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AccessorError::Query(e.to_string()))?;

        Ok(ModelFinancials { revenue, cost })
    }
}
