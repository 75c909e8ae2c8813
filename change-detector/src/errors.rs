use thiserror::Error;

pub type Result<T> = std::result::Result<T, DetectError>;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("repository not found: {0}")]
    MissingRepo(String),

    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    #[error("invalid ignore glob: {0}")]
    InvalidGlob(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}
