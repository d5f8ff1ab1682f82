use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Field name to human-readable message, reported all at once.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Auth(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("receipt rendering failed: {0}")]
    Render(String),

    #[error("receipt delivery failed: {0}")]
    Delivery(String),

    #[error("spreadsheet export failed: {0}")]
    Export(String),
}

impl AppError {
    pub fn field(field: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), message.to_string());
        AppError::Validation(fields)
    }

    pub fn donation_not_found() -> Self {
        AppError::NotFound("Donation".to_string())
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<r2d2_sqlite::rusqlite::Error> for AppError {
    fn from(e: r2d2_sqlite::rusqlite::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        AppError::Export(e.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Storage(format!("background task failed: {}", e))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, fields) = match self {
            AppError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Please fix the errors in the form".to_string(),
                Some(fields),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} not found", what),
                None,
            ),
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "Database error".to_string(),
                    None,
                )
            }
            AppError::Render(msg) => {
                tracing::error!(error = %msg, "Receipt rendering failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "render_error",
                    "Failed to generate receipt".to_string(),
                    None,
                )
            }
            AppError::Delivery(msg) => {
                tracing::error!(error = %msg, "Receipt delivery failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "delivery_error",
                    format!("Failed to send email: {}", msg),
                    None,
                )
            }
            AppError::Export(msg) => {
                tracing::error!(error = %msg, "Spreadsheet export failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "export_error",
                    "Failed to export donations".to_string(),
                    None,
                )
            }
        };

        (status, Json(ErrorResponse { error, message, fields })).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
