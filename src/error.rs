use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    services::{attachments::AttachmentError, ticket::TicketError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend failed; the operation was aborted before any side effect.
    #[error("storage failure")]
    Internal(#[source] StorageError),
    /// Request carried no usable identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Identity is known but lacks membership or role.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// External ticket tracker refused or failed the request.
    #[error("ticket tracker: {0}")]
    External(#[from] TicketError),
    /// Attachment storage failed while committing uploaded files.
    #[error("attachment storage failure")]
    Attachment(#[from] AttachmentError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Internal(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Missing or malformed identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Membership or role insufficient.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Upstream service rejected the request.
    #[error("bad gateway: {0}")]
    BadGateway(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Internal(source) => {
                error!(error = %source, detail = ?source, "storage failure while serving request");
                AppError::Internal(internal_detail(&source))
            }
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::External(TicketError::Unavailable(message)) => {
                AppError::ServiceUnavailable(format!("ticket tracker unavailable: {message}"))
            }
            ServiceError::External(other) => AppError::BadGateway(other.to_string()),
            ServiceError::Attachment(AttachmentError::InvalidReference(reference)) => {
                AppError::BadRequest(format!("invalid attachment `{reference}`"))
            }
            ServiceError::Attachment(source) => {
                error!(error = %source, detail = ?source, "attachment storage failure");
                AppError::Internal(if cfg!(debug_assertions) {
                    source.to_string()
                } else {
                    "unexpected attachment storage failure".into()
                })
            }
        }
    }
}

/// Store error text is only exposed by debug builds.
fn internal_detail(source: &StorageError) -> String {
    if cfg!(debug_assertions) {
        source.to_string()
    } else {
        "unexpected storage failure".into()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
