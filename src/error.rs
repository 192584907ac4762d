use axum::http::StatusCode;

use crate::store::StoreError;

/// Failures surfaced to the caller of any session operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    /// Rejected before any network call.
    #[error("{0}")]
    Validation(String),
    /// No signed-in identity or no active baby.
    #[error("{0}")]
    MissingContext(String),
    /// Store or auth provider failure, message passed through.
    #[error("{0}")]
    Backend(String),
    #[error("{0}")]
    NotFound(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::MissingContext(_) => StatusCode::PRECONDITION_FAILED,
            AppError::Backend(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Backend(e.to_string())
    }
}

impl From<AppError> for (StatusCode, String) {
    fn from(e: AppError) -> Self {
        (e.status(), e.to_string())
    }
}
