use thiserror::Error;

use crate::auth::AuthzError;
use crate::services::api::BackendError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Process exit code used by the probe binary
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::InvalidInput(_) => 2,
            AppError::Unauthenticated(_) => 3,
            AppError::Forbidden(_) => 4,
            AppError::ServiceUnavailable(_) => 5,
            AppError::Internal(_) => 1,
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized(_) => AppError::Unauthenticated(err.to_string()),
            BackendError::InvalidRequest(msg) => AppError::InvalidInput(msg),
            BackendError::Connection(_)
            | BackendError::Timeout
            | BackendError::Status { .. }
            | BackendError::Decode(_) => AppError::ServiceUnavailable(err.to_string()),
        }
    }
}
