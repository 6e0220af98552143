//! Error types for meridian-deployer.

use meridian_nuvla::NuvlaError;

/// Result type alias using [`DeployerError`].
pub type DeployerResult<T> = Result<T, DeployerError>;

/// Errors that can occur while reconciling deployments.
#[derive(Debug, thiserror::Error)]
pub enum DeployerError {
    /// Configuration could not be loaded or is incomplete.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP transport error or error status from the job manager.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint did not return a usable access token.
    #[error("token issuance failed: {0}")]
    TokenIssuance(String),

    /// The job manager kept rejecting the session after re-authenticating.
    #[error("{operation}: re-authentication attempts exhausted")]
    ReauthExhausted {
        /// The logical operation that was abandoned.
        operation: String,
    },

    /// The job manager returned a document that could not be understood.
    #[error("job source error: {0}")]
    JobSource(String),

    /// Target platform error.
    #[error("platform error: {0}")]
    Nuvla(#[from] NuvlaError),

    /// Target platform error from a non-Nuvla implementation.
    #[error("platform error: {0}")]
    Platform(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeployerError {
    /// Create a job source error.
    #[must_use]
    pub fn job_source(msg: impl Into<String>) -> Self {
        Self::JobSource(msg.into())
    }

    /// Create a platform error.
    #[must_use]
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
