//! Domain-level error types for chat-offboard.
//!
//! All errors are typed with `thiserror`. Per-conversation failures are
//! caught by the exporter; everything else aborts the run.

use thiserror::Error;

/// Maximum number of response-body characters kept in an HTTP error.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// No usable access token could be obtained for the session.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The remote API answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Failed to open or query the browser local-storage database.
    #[error("Local storage error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Payload had an unexpected shape or value.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a local-storage error from a rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create a transport error from a reqwest error.
    pub fn transport(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an HTTP status error, keeping only the head of the body.
    pub fn http(status: u16, body: &str) -> Self {
        Self::Http {
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_truncates_body() {
        let body = "x".repeat(500);
        match AppError::http(502, &body) {
            AppError::Http { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body.chars().count(), MAX_ERROR_BODY_CHARS);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_http_error_display() {
        let err = AppError::http(404, "not found");
        assert_eq!(err.to_string(), "HTTP 404: not found");
    }
}
