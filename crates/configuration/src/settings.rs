use crate::error::ConfigError;
use serde::Deserialize;
use std::time::Duration;

/// The stock level a segment is expected to hold when no explicit target is
/// configured. The stock index reads 100 when current stock equals the target.
pub const DEFAULT_TARGET_STOCK: i64 = 50;

/// The root configuration structure for the KPI engine.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSettings,
    pub segments: Vec<SegmentSettings>,
    #[serde(default)]
    pub alerting: AlertingSettings,
}

impl Config {
    /// Checks the cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.cadence.is_zero() {
            return Err(ConfigError::ValidationError(
                "engine.cadence must be greater than zero".to_string(),
            ));
        }
        if !self.segments.iter().any(|s| s.active) {
            return Err(ConfigError::ValidationError(
                "at least one active segment must be configured".to_string(),
            ));
        }
        Ok(())
    }

    /// The segments the scheduler iterates on each cycle.
    pub fn active_segments(&self) -> impl Iterator<Item = &SegmentSettings> {
        self.segments.iter().filter(|s| s.active)
    }

    /// Looks up a segment by its code, active or not.
    pub fn segment(&self, code: &str) -> Option<&SegmentSettings> {
        self.segments.iter().find(|s| s.code == code)
    }
}

/// Timing parameters for the computation cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// How often the scheduler fires a full cycle.
    #[serde(with = "humantime_serde", default = "default_cadence")]
    pub cadence: Duration,

    /// Upper bound on any single business-data query. A query exceeding it
    /// counts as a partial failure for that metric, not a cycle abort.
    #[serde(with = "humantime_serde", default = "default_accessor_timeout")]
    pub accessor_timeout: Duration,

    /// Pause before the single retry of a failed snapshot write.
    #[serde(with = "humantime_serde", default = "default_retry_backoff")]
    pub persist_retry_backoff: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cadence: default_cadence(),
            accessor_timeout: default_accessor_timeout(),
            persist_retry_backoff: default_retry_backoff(),
        }
    }
}

/// One business-model scope KPIs are computed for.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentSettings {
    /// Stable identifier, e.g. "resale" or "new_build".
    pub code: String,
    /// Display name for reports and alerts.
    pub name: String,
    /// Expected standing stock for the stock index. Falls back to
    /// `DEFAULT_TARGET_STOCK` when unset.
    pub target_stock: Option<i64>,
    /// Inactive segments are skipped by the scheduler but remain queryable
    /// on demand.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl SegmentSettings {
    pub fn target_stock_or_default(&self) -> i64 {
        self.target_stock.unwrap_or(DEFAULT_TARGET_STOCK)
    }
}

/// Controls for the alert emitter's optional push channel.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertingSettings {
    /// Disabling this stops alert rows entirely, not just the push channel.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Where breach summaries are POSTed. Unset disables push while keeping
    /// alert rows.
    pub webhook_url: Option<String>,
}

impl Default for AlertingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
        }
    }
}

fn default_cadence() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_accessor_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_retry_backoff() -> Duration {
    Duration::from_secs(2)
}

fn default_true() -> bool {
    true
}
