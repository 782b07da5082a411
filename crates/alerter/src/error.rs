use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlerterError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook endpoint returned an error: {0}")]
    ApiError(String),

    #[error("Alert persistence failed: {0}")]
    Store(#[from] store::StoreError),
}
