//! Error types for the backend client.

use thiserror::Error;

/// Errors raised while talking to the backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// HTTP client configuration error.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Reading the streamed body failed after the response started.
    #[error("Stream interrupted: {0}")]
    Stream(String),

    /// The response lacked something the caller needs.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ClientError {
    /// Whether the failure happened after a stream was established.
    #[must_use]
    pub const fn is_mid_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// Whether the backend rejected the session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

/// Convenience result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_and_predicates() {
        let err = ClientError::Status {
            status: 401,
            body: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned 401: nope");
        assert!(err.is_unauthorized());
        assert!(!err.is_mid_stream());
        assert!(ClientError::Stream("reset".to_string()).is_mid_stream());
    }
}
