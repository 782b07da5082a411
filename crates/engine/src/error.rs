use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] configuration::error::ConfigError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] indicators::IndicatorError),

    #[error("Snapshot store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Alerter error: {0}")]
    Alerter(#[from] alerter::AlerterError),
}
