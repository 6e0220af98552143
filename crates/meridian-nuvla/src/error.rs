//! Error types for meridian-nuvla.

use serde::Deserialize;

/// Result type alias using [`NuvlaError`].
pub type NuvlaResult<T> = Result<T, NuvlaError>;

/// Errors returned by the Nuvla client.
#[derive(Debug, thiserror::Error)]
pub enum NuvlaError {
    /// Transport-level failure (connection, timeout, body decoding).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Session login was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The resource already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The resource does not exist or is not visible to the session.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Any other non-success response from the API.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// The response was well-formed HTTP but not the expected document.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl NuvlaError {
    /// Create an unexpected-response error.
    #[must_use]
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::UnexpectedResponse(msg.into())
    }

    /// Returns true if the error is a 409 conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    reason: Option<String>,
}

/// Extract a human-readable message from an API error body.
///
/// Tries the `message` field first, then `error.code - error.reason`, and
/// falls back to the raw body text.
#[must_use]
pub fn extract_message(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return body.trim().to_owned();
    };

    if let Some(message) = parsed.message {
        return message;
    }

    match parsed.error {
        Some(ErrorDetail {
            code: Some(code),
            reason: Some(reason),
        }) => format!("{code} - {reason}"),
        _ => body.trim().to_owned(),
    }
}
