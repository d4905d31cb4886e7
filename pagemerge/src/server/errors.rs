//! Mapping of library errors onto HTTP responses.

use axum::{
    Json,
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::error::PageMergeError;

/// HTTP-facing error type.
///
/// Every handler returns `Result<_, ApiError>`; the response body is always
/// `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request is malformed or does not fit the current state.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The addressed file or page does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request body exceeds the configured limit.
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A document or page could not be processed.
    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    /// The merge failed. Source cleanup has already run.
    #[error("Merge failed: {0}")]
    MergeFailed(String),

    /// Anything else.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<PageMergeError> for ApiError {
    fn from(err: PageMergeError) -> Self {
        match err {
            PageMergeError::InvalidOrder { .. }
            | PageMergeError::DuplicatePage { .. }
            | PageMergeError::InvalidRotation { .. }
            | PageMergeError::InvalidPageId { .. }
            | PageMergeError::InvalidStorageKey { .. }
            | PageMergeError::NoPagesToMerge
            | PageMergeError::InvalidConfig { .. } => Self::BadRequest(err.to_string()),
            PageMergeError::UnknownFile { .. } => Self::NotFound(err.to_string()),
            PageMergeError::UnreadablePdf { .. } | PageMergeError::RenderFailure { .. } => {
                Self::UnprocessableEntity(err.to_string())
            }
            PageMergeError::MergeFailed { reason } => Self::MergeFailed(reason),
            PageMergeError::DeliveryFailure { .. }
            | PageMergeError::FailedToWrite { .. }
            | PageMergeError::Io { .. }
            | PageMergeError::Other { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::BadRequest(err.body_text())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg,
            ),
            ApiError::MergeFailed(msg) => {
                tracing::error!("Merge error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "MERGE_FAILED", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
