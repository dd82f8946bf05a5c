//! Error handling for the stock ledger
//!
//! Every failure surfaces to HTTP callers as `{"error": {"code", "message", "field"?}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::MovementError;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Write-path errors: the whole batch is rolled back
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error(
        "Insufficient stock for movement {index}: product {product_id} in warehouse {warehouse_id} \
         has {available}, requested {requested}"
    )]
    InsufficientStock {
        index: usize,
        product_id: Uuid,
        warehouse_id: Uuid,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Concurrent update of product {product_id} in warehouse {warehouse_id}")]
    ConcurrencyConflict { product_id: Uuid, warehouse_id: Uuid },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Read-path errors
    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Lift a structural movement error, tagging the batch index
    pub fn invalid_movement(index: usize, err: MovementError) -> Self {
        AppError::Validation {
            field: format!("movements[{}].{}", index, err.field()),
            message: err.to_string(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Configuration(_)
            | AppError::Database(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            AppError::Validation { field, message } => ErrorDetail {
                field: Some(field.clone()),
                ..ErrorDetail::new(self.code(), message.clone())
            },
            AppError::InsufficientStock { index, .. } => ErrorDetail {
                field: Some(format!("movements[{}].quantity", index)),
                ..ErrorDetail::new(self.code(), self.to_string())
            },
            AppError::NotFound(resource) => {
                ErrorDetail::new(self.code(), format!("{} not found", resource))
            }
            AppError::Database(_) => ErrorDetail::new(self.code(), "A database error occurred"),
            AppError::InternalError(_) => {
                ErrorDetail::new(self.code(), "An internal server error occurred")
            }
            _ => ErrorDetail::new(self.code(), self.to_string()),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!(code = self.code(), "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
