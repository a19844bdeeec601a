//! Unified error types for cacheshell.
//!
//! Every storage, network, and delivery failure in the worker funnels into
//! this enum; callers decide whether a variant is retryable, absorbable, or
//! terminal.

use tokio_rusqlite::rusqlite;

/// Unified error types for the cacheshell worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Write rejected because the store byte budget would be exceeded.
    #[error("QUOTA_EXCEEDED: tier {0}")]
    QuotaExceeded(String),

    /// Tier deletion kept failing after bounded retries.
    #[error("DELETE_BLOCKED: tier {0}")]
    DeleteBlocked(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// HTTP error response or transport failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// No cached response found anywhere for the request.
    #[error("NOT_CACHED: {0}")]
    NotCached(String),

    /// Worker-to-page message could not be delivered to any client.
    #[error("DELIVERY_FAILED: {0}")]
    DeliveryFailed(String),

    /// Message from the page failed protocol validation.
    #[error("INVALID_MESSAGE: {0}")]
    InvalidMessage(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotCached("/images/logo.svg".to_string());
        assert!(err.to_string().contains("NOT_CACHED"));
        assert!(err.to_string().contains("/images/logo.svg"));
    }

    #[test]
    fn test_quota_error_names_tier() {
        let err = Error::QuotaExceeded("images-runtime-v3".to_string());
        assert!(err.to_string().contains("images-runtime-v3"));
    }
}
