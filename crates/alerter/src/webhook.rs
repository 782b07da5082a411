use crate::error::AlerterError;
use configuration::AlertingSettings;
use core_types::Alert;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;

/// The JSON payload POSTed to the configured webhook for each breach.
#[derive(Debug, Serialize)]
struct BreachPayload<'a> {
    metric: &'a str,
    segment: &'a str,
    period: String,
    severity: &'a str,
    value: Decimal,
    message: &'a str,
}

/// A client for pushing breach summaries to an external webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Creates a new `WebhookNotifier`.
    ///
    /// Returns `None` if no webhook URL is configured, allowing the system
    /// to gracefully keep alert rows while disabling the push channel.
    pub fn new(settings: &AlertingSettings) -> Option<Self> {
        let url = settings.webhook_url.clone()?;
        if url.is_empty() {
            tracing::warn!("Alert webhook is configured but the URL is empty; push disabled.");
            return None;
        }
        Some(Self {
            client: Client::new(),
            url,
        })
    }

    /// Sends one breach summary to the configured endpoint.
    pub async fn send(&self, alert: &Alert, value: Decimal) -> Result<(), AlerterError> {
        let payload = BreachPayload {
            metric: alert.metric_code.as_str(),
            segment: &alert.segment,
            period: alert.period.label(),
            severity: alert.severity.as_str(),
            value,
            message: &alert.message,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlerterError::ApiError(error_text));
        }

        Ok(())
    }
}
