//! Pipeline error taxonomy, one variant per failing stage family.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] source_fetcher::errors::FetchError),

    #[error("change detection failed: {0}")]
    Detect(#[from] change_detector::errors::DetectError),

    #[error("generation failed: {0}")]
    Generate(#[from] artifact_gen::GenError),

    #[error("store failed: {0}")]
    Store(#[from] artifact_store::StoreError),

    #[error("delivery failed: {0}")]
    Delivery(#[from] delivery_agent::errors::DeliveryError),

    #[error("stage deadline exceeded after {0}s")]
    Deadline(u64),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("internal error: {0}")]
    Internal(String),
}
