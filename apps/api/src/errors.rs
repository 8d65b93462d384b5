#![allow(dead_code)]

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::hubspot::HubSpotError;
use crate::sheets::SheetsError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Per-record failures inside a batch never become an `AppError`; they are
/// collected into the operation's `failed` array. Only request-level problems
/// (bad input, missing auth, total upstream failure) surface here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HubSpot error: {0}")]
    HubSpot(String),

    #[error("Google Sheets error: {0}")]
    Sheets(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<HubSpotError> for AppError {
    fn from(err: HubSpotError) -> Self {
        match err {
            HubSpotError::Api { status: 401, .. } => AppError::Unauthorized,
            other => AppError::HubSpot(other.to_string()),
        }
    }
}

impl From<SheetsError> for AppError {
    fn from(err: SheetsError) -> Self {
        match err {
            SheetsError::Api { status: 401, .. } => AppError::Unauthorized,
            other => AppError::Sheets(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Account not connected or token expired".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::HubSpot(msg) => {
                tracing::error!("HubSpot error: {msg}");
                (StatusCode::BAD_GATEWAY, "HUBSPOT_ERROR", msg.clone())
            }
            AppError::Sheets(msg) => {
                tracing::error!("Google Sheets error: {msg}");
                (StatusCode::BAD_GATEWAY, "SHEETS_ERROR", msg.clone())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
