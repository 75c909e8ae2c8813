//! Store error taxonomy. A store failure is fatal for a pipeline run: the
//! index row must not be written when objects did not land.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object backend error: {0}")]
    Backend(String),

    #[error("index error: {0}")]
    Index(#[from] sqlx::Error),

    #[error("metadata serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid bucket path: {0}")]
    InvalidBucketPath(String),
}
