//! Error types for the voxtask gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voxtask gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech recognition backend error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Command dispatch error
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Command queue error (queue closed, consumer gone)
    #[error("queue error: {0}")]
    Queue(String),

    /// Remote command endpoint answered with a non-success status
    #[error("remote error {status}: {message}")]
    Remote {
        /// HTTP status code
        status: u16,
        /// Error message from the response body
        message: String,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Authentication/authorization error
    #[error("auth error: {0}")]
    Auth(String),
}

impl Error {
    /// Whether retrying the same request later could succeed
    ///
    /// Connection failures, timeouts, rate limits and server errors are
    /// transient; validation and decoding failures are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Remote { status, message } => crate::queue::is_recoverable(*status, message),
            Self::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_server_errors_are_transient() {
        let err = Error::Remote {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn remote_client_errors_are_not_transient() {
        let err = Error::Remote {
            status: 400,
            message: "bad request".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn validation_errors_are_not_transient() {
        assert!(!Error::Config("missing".to_string()).is_transient());
        assert!(!Error::NotFound("task".to_string()).is_transient());
    }
}
