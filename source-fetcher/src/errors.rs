//! Fetcher error taxonomy.
//!
//! Git error text can carry remote URLs and credential material, so every
//! message derived from git2 goes through the sanitizer at construction.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("repository not found: {0}")]
    MissingRepo(String),

    #[error("authentication denied by remote")]
    AuthDenied,

    #[error("transient network failure: {0}")]
    Transient(String),

    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl FetchError {
    /// Only network-shaped failures qualify for backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl From<git2::Error> for FetchError {
    fn from(e: git2::Error) -> Self {
        use git2::{ErrorClass, ErrorCode};

        let message = redact::sanitize(e.message());
        match (e.class(), e.code()) {
            (_, ErrorCode::Auth) | (ErrorClass::Ssh, ErrorCode::Certificate) => {
                FetchError::AuthDenied
            }
            (ErrorClass::Net | ErrorClass::Http | ErrorClass::Ssh, _) => {
                FetchError::Transient(message)
            }
            (_, ErrorCode::NotFound) => FetchError::RevisionNotFound(message),
            _ => FetchError::Git(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_class_is_retryable() {
        let e: FetchError =
            git2::Error::new(git2::ErrorCode::GenericError, git2::ErrorClass::Net, "timeout")
                .into();
        assert!(e.is_retryable());
    }

    #[test]
    fn auth_is_not_retryable() {
        let e: FetchError =
            git2::Error::new(git2::ErrorCode::Auth, git2::ErrorClass::Http, "denied").into();
        assert!(matches!(e, FetchError::AuthDenied));
        assert!(!e.is_retryable());
    }

    #[test]
    fn git_messages_are_sanitized() {
        let token = format!("ghp_{}", "Zz19".repeat(9));
        let e: FetchError = git2::Error::new(
            git2::ErrorCode::GenericError,
            git2::ErrorClass::Net,
            format!("failed to connect with {token}"),
        )
        .into();
        assert!(!e.to_string().contains(&token));
        assert!(e.to_string().contains(redact::REDACTED));
    }
}
