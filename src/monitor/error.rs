use thiserror::Error;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::identity::AuthError;

/// Errors surfaced to the presentation layer.
///
/// Deleting a missing entry is not an error and has no variant here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl MonitorError {
    /// Short text for the user; never retried automatically.
    pub fn user_message(&self) -> String {
        match self {
            MonitorError::AuthFailure(reason) => reason.clone(),
            MonitorError::BackendUnavailable(_) => {
                "Cannot reach the server. Check your connection and try again.".to_string()
            }
            MonitorError::PermissionDenied(_) => {
                "You do not have access to this data.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<BackendError> for MonitorError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unavailable(msg) => MonitorError::BackendUnavailable(msg),
            BackendError::StorageError(msg) => MonitorError::BackendUnavailable(msg),
            BackendError::PermissionDenied(msg) => MonitorError::PermissionDenied(msg),
            BackendError::InvalidPath(msg) => MonitorError::InvalidPath(msg),
            BackendError::SerializationError(msg) => MonitorError::SerializationError(msg),
        }
    }
}

impl From<AuthError> for MonitorError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unavailable(msg) => MonitorError::BackendUnavailable(msg),
            other => MonitorError::AuthFailure(other.to_string()),
        }
    }
}

impl From<ConfigError> for MonitorError {
    fn from(e: ConfigError) -> Self {
        MonitorError::Config(e.to_string())
    }
}
