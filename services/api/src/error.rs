//! Custom error types for the API service

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{BytesRejection, JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::{ExportError, StoreError};
use generator::OrchestratorError;
use serde_json::json;
use thiserror::Error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with the current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Nothing to act on
    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    /// Request could not be extracted; keeps the extractor's status
    #[error("Rejected: {1}")]
    Rejected(StatusCode, String),
}

macro_rules! impl_from_rejection {
    ($($rejection:ty),+ $(,)?) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    ApiError::Rejected(rejection.status(), rejection.body_text())
                }
            }
        )+
    };
}

impl_from_rejection!(
    JsonRejection,
    PathRejection,
    MultipartRejection,
    MultipartError,
    BytesRejection,
);

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        let message = error.to_string();
        match error {
            StoreError::NotFound(_) => ApiError::NotFound(message),
            StoreError::InvalidTransition { .. } | StoreError::NotEditable { .. } => {
                ApiError::Conflict(message)
            }
            StoreError::EmptyKeyword | StoreError::KeywordIndexOutOfRange { .. } => {
                ApiError::BadRequest(message)
            }
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(error: OrchestratorError) -> Self {
        let message = error.to_string();
        match error {
            OrchestratorError::AlreadyRunning => ApiError::Conflict(message),
            OrchestratorError::InvalidSettings(_) => ApiError::BadRequest(message),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(error: ExportError) -> Self {
        ApiError::Unprocessable(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Rejected(status, msg) => (status, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
