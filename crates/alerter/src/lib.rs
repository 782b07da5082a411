use configuration::AlertingSettings;
use core_types::{Alert, AlertSeverity, KpiSnapshot};
use indicators::MetricDefinition;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use store::AlertSink;

pub mod error;
pub mod webhook;

pub use error::AlerterError;
pub use webhook::WebhookNotifier;

/// Evaluates freshly computed snapshots against registry thresholds and
/// raises alerts for breaches.
///
/// Alerting is best-effort by design: the snapshot has already been
/// persisted by the time this runs, and neither a sink nor a webhook failure
/// is allowed to undo that.
pub struct AlertEmitter {
    sink: Arc<dyn AlertSink>,
    settings: AlertingSettings,
    notifier: Option<WebhookNotifier>,
}

impl AlertEmitter {
    pub fn new(sink: Arc<dyn AlertSink>, settings: AlertingSettings) -> Self {
        let notifier = WebhookNotifier::new(&settings);
        if notifier.is_none() {
            tracing::info!("No alert webhook configured; breaches are persisted only.");
        }
        Self {
            sink,
            settings,
            notifier,
        }
    }

    /// Checks one snapshot against its metric's thresholds. Returns the
    /// alert that was raised, or `None` when the value is in range, the
    /// metric has no thresholds, the value is flagged undefined, or an
    /// unacknowledged alert already covers this metric/segment/period.
    pub async fn evaluate(
        &self,
        definition: &MetricDefinition,
        snapshot: &KpiSnapshot,
    ) -> Result<Option<Alert>, AlerterError> {
        if !self.settings.enabled {
            return Ok(None);
        }
        // An undefined value (ROI with no cost basis) is not a breach.
        if snapshot.is_undefined() {
            return Ok(None);
        }

        let Some((threshold, bound)) = breached_threshold(definition, snapshot.value) else {
            return Ok(None);
        };

        if self
            .sink
            .has_open(snapshot.metric_code, &snapshot.segment, snapshot.period)
            .await?
        {
            tracing::debug!(
                metric = %snapshot.metric_code,
                segment = %snapshot.segment,
                period = %snapshot.period.label(),
                "Open alert already covers this breach; skipping duplicate."
            );
            return Ok(None);
        }

        let severity = severity_for(snapshot.value, threshold);
        let message = format!(
            "{} for segment '{}' ({}) is {} {}, {} the {} threshold of {}",
            definition.name,
            snapshot.segment,
            snapshot.period.label(),
            snapshot.value.round_dp(2),
            snapshot.unit,
            bound.direction(),
            bound.label(),
            threshold,
        );
        let alert = Alert::new(
            snapshot.metric_code,
            snapshot.segment.clone(),
            snapshot.period,
            severity,
            message,
        );
        tracing::warn!(
            metric = %snapshot.metric_code,
            segment = %snapshot.segment,
            severity = %severity,
            value = %snapshot.value,
            threshold = %threshold,
            "KPI threshold breached."
        );

        let stored = self.sink.insert(alert).await?;

        // Push is best-effort: a webhook failure is logged and swallowed so
        // it can never block the cycle.
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.send(&stored, snapshot.value).await {
                tracing::error!(error = %e, "Failed to push alert to webhook.");
            }
        }

        Ok(Some(stored))
    }
}

/// Which side of the configured range a value fell out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Min,
    Max,
}

impl Bound {
    fn direction(&self) -> &'static str {
        match self {
            Bound::Min => "below",
            Bound::Max => "above",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Bound::Min => "minimum",
            Bound::Max => "maximum",
        }
    }
}

/// Returns the threshold the value breached, if any. A metric with no
/// thresholds never alerts.
fn breached_threshold(
    definition: &MetricDefinition,
    value: Decimal,
) -> Option<(Decimal, Bound)> {
    if let Some(min) = definition.min_threshold {
        if value < min {
            return Some((min, Bound::Min));
        }
    }
    if let Some(max) = definition.max_threshold {
        if value > max {
            return Some((max, Bound::Max));
        }
    }
    None
}

/// Severity scales with how far outside the range the value landed: within
/// 20% of the threshold is a warning, beyond that critical. A breached zero
/// threshold has no scale to measure against and is always critical.
fn severity_for(value: Decimal, threshold: Decimal) -> AlertSeverity {
    if threshold.is_zero() {
        return AlertSeverity::Critical;
    }
    let overshoot = ((value - threshold) / threshold).abs();
    if overshoot <= dec!(0.2) {
        AlertSeverity::Warning
    } else {
        AlertSeverity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{MetricCode, Period, Unit};
    use serde_json::json;
    use store::MemoryAlertSink;

    fn snapshot(code: MetricCode, value: Decimal) -> KpiSnapshot {
        KpiSnapshot::new(
            code,
            "resale",
            Period::month(2025, 3).unwrap(),
            value,
            Unit::Percent,
            json!({}),
        )
    }

    fn definition(
        code: MetricCode,
        min: Option<Decimal>,
        max: Option<Decimal>,
    ) -> MetricDefinition {
        MetricDefinition {
            code,
            name: "Test metric",
            unit: Unit::Percent,
            min_threshold: min,
            max_threshold: max,
        }
    }

    fn emitter(sink: Arc<MemoryAlertSink>) -> AlertEmitter {
        AlertEmitter::new(
            sink,
            AlertingSettings {
                enabled: true,
                webhook_url: None,
            },
        )
    }

    #[tokio::test]
    async fn no_thresholds_never_alerts() {
        let sink = Arc::new(MemoryAlertSink::new());
        let emitter = emitter(sink.clone());
        let def = definition(MetricCode::TotalValuation, None, None);

        let raised = emitter
            .evaluate(&def, &snapshot(MetricCode::TotalValuation, dec!(0)))
            .await
            .unwrap();
        assert!(raised.is_none());
        assert!(sink.all().await.is_empty());
    }

    #[tokio::test]
    async fn near_breach_is_a_warning_far_breach_is_critical() {
        let sink = Arc::new(MemoryAlertSink::new());
        let emitter = emitter(sink.clone());
        let def = definition(MetricCode::ConversionRate, Some(dec!(5)), None);

        // 4.5 is 10% under the threshold of 5.
        let near = emitter
            .evaluate(&def, &snapshot(MetricCode::ConversionRate, dec!(4.5)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(near.severity, AlertSeverity::Warning);

        sink.acknowledge(near.id).await;

        // 1 is 80% under it.
        let far = emitter
            .evaluate(&def, &snapshot(MetricCode::ConversionRate, dec!(1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(far.severity, AlertSeverity::Critical);
    }

    #[tokio::test]
    async fn max_threshold_breaches_alert_too() {
        let sink = Arc::new(MemoryAlertSink::new());
        let emitter = emitter(sink.clone());
        let def = definition(MetricCode::AvgTimeToSale, None, Some(dec!(90)));

        let raised = emitter
            .evaluate(&def, &snapshot(MetricCode::AvgTimeToSale, dec!(130)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raised.severity, AlertSeverity::Critical);
        assert!(raised.message.contains("above the maximum"));
    }

    #[tokio::test]
    async fn open_alert_suppresses_duplicates_until_acknowledged() {
        let sink = Arc::new(MemoryAlertSink::new());
        let emitter = emitter(sink.clone());
        let def = definition(MetricCode::ConversionRate, Some(dec!(5)), None);
        let snap = snapshot(MetricCode::ConversionRate, dec!(2));

        let first = emitter.evaluate(&def, &snap).await.unwrap();
        assert!(first.is_some());
        let second = emitter.evaluate(&def, &snap).await.unwrap();
        assert!(second.is_none());
        assert_eq!(sink.all().await.len(), 1);

        sink.acknowledge(first.unwrap().id).await;
        let third = emitter.evaluate(&def, &snap).await.unwrap();
        assert!(third.is_some());
        assert_eq!(sink.all().await.len(), 2);
    }

    #[tokio::test]
    async fn undefined_values_are_not_breaches() {
        let sink = Arc::new(MemoryAlertSink::new());
        let emitter = emitter(sink.clone());
        let def = definition(MetricCode::RoiByModel, Some(dec!(0)), None);

        let mut snap = snapshot(MetricCode::RoiByModel, dec!(0));
        snap.metadata = json!({ "undefined": true });
        let raised = emitter.evaluate(&def, &snap).await.unwrap();
        assert!(raised.is_none());
    }

    #[tokio::test]
    async fn disabled_alerting_writes_nothing() {
        let sink = Arc::new(MemoryAlertSink::new());
        let emitter = AlertEmitter::new(
            sink.clone(),
            AlertingSettings {
                enabled: false,
                webhook_url: None,
            },
        );
        let def = definition(MetricCode::ConversionRate, Some(dec!(5)), None);

        let raised = emitter
            .evaluate(&def, &snapshot(MetricCode::ConversionRate, dec!(1)))
            .await
            .unwrap();
        assert!(raised.is_none());
        assert!(sink.all().await.is_empty());
    }

    #[tokio::test]
    async fn breached_zero_threshold_is_always_critical() {
        let sink = Arc::new(MemoryAlertSink::new());
        let emitter = emitter(sink.clone());
        let def = definition(MetricCode::StockIndex, None, Some(dec!(0)));

        let raised = emitter
            .evaluate(&def, &snapshot(MetricCode::StockIndex, dec!(3)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raised.severity, AlertSeverity::Critical);
    }
}
