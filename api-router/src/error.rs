use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

/// Boundary error: every internal failure is flattened into the generic
/// `"Invalid Input: <description>"` body the service has always returned.
/// The internal taxonomy survives only as the HTTP status code.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Invalid Input: {0}")]
    NotFound(String),

    #[error("Invalid Input: {0}")]
    BadRequest(String),

    #[error("Invalid Input: {0}")]
    Unprocessable(String),

    #[error("Invalid Input: {0}")]
    Internal(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::IndexNotFound(_) => Self::NotFound(err.to_string()),
            AppError::UnsupportedOperation(_) | AppError::Validation(_) => {
                Self::BadRequest(err.to_string())
            }
            AppError::DocumentRead(_) => Self::Unprocessable(err.to_string()),
            AppError::Storage(_) | AppError::OpenAI(_) | AppError::Embedding(_) => {
                tracing::error!("Backend error: {:?}", err);
                Self::Internal(err.to_string())
            }
            other => {
                tracing::error!("Internal error: {:?}", other);
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let error_response = ErrorResponse {
            error: self.to_string(),
            status: "error".to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    status: String,
}
