use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Business data error: {0}")]
    Accessor(#[from] accessor::AccessorError),
}
