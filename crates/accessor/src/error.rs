use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccessorError {
    #[error("Business data query '{0}' timed out")]
    Timeout(String),

    #[error("Business data query failed: {0}")]
    Query(String),
}
