//! Client error types

use dealdesk_core::CoreError;
use std::fmt;
use thiserror::Error;

/// Why the session was terminated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutReason {
    /// A 401 arrived and no refresh token was stored
    NoRefreshToken,
    /// The refresh endpoint answered with a non-success status
    RefreshRejected(u16),
    /// The refresh call failed before a usable answer arrived
    RefreshFailed(String),
    /// Another request already terminated the session
    SessionTerminated,
}

impl fmt::Display for SignOutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRefreshToken => write!(f, "no refresh token stored"),
            Self::RefreshRejected(status) => write!(f, "refresh rejected with status {status}"),
            Self::RefreshFailed(message) => write!(f, "refresh failed: {message}"),
            Self::SessionTerminated => write!(f, "session terminated by a concurrent request"),
        }
    }
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Session could not be renewed; credentials were cleared
    #[error("Session expired: {0}")]
    SessionExpired(SignOutReason),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Credential store failure
    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether the session is gone and the user has to log in again
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidConfig { message } => Self::Configuration(message),
            other => Self::Storage(other.to_string()),
        }
    }
}
