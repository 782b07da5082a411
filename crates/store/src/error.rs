use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Snapshot write failed: {0}")]
    Write(String),

    #[error("Snapshot lookup failed: {0}")]
    Lookup(String),

    #[error("Alert write failed: {0}")]
    Alert(String),
}
