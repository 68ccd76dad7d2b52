//! Error types for Libris server

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Stable error codes returned in every failure payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    DbFailure = 3,
    NoSuchBook = 5,
    NotAvailable = 7,
    BadValue = 18,
    BookOnLoan = 21,
    ConcurrentConflict = 22,
    NoActiveLoan = 23,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Only {available} copies available, {requested} requested")]
    Unavailable { requested: i32, available: i32 },

    #[error("Copies were taken by another borrow while requesting {requested}")]
    ConcurrentConflict { requested: i32 },

    #[error("No active loan for {borrower_name} ({borrower_phone})")]
    NoActiveLoan {
        borrower_name: String,
        borrower_phone: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the caller may run the whole operation again
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrentConflict { .. })
    }

    /// HTTP status, error code and optional structured context
    fn parts(&self) -> (StatusCode, ErrorCode, Option<serde_json::Value>) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook, None),
            AppError::Unavailable {
                requested,
                available,
            } => (
                StatusCode::CONFLICT,
                ErrorCode::NotAvailable,
                Some(json!({ "requested": requested, "available": available })),
            ),
            AppError::ConcurrentConflict { requested } => (
                StatusCode::CONFLICT,
                ErrorCode::ConcurrentConflict,
                Some(json!({ "requested": requested, "retryable": true })),
            ),
            AppError::NoActiveLoan {
                borrower_name,
                borrower_phone,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::NoActiveLoan,
                Some(json!({ "borrowerName": borrower_name, "borrowerPhone": borrower_phone })),
            ),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::BookOnLoan, None),
            AppError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure, None)
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure, None),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation(messages.join("; "))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Always false
    pub success: bool,
    pub code: u32,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, details) = self.parts();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Conflict(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            success: false,
            code: code as u32,
            error: format!("{:?}", code),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
