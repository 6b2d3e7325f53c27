// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Every response carries a stable machine-readable `error` code and a
//! Norwegian `message` suitable for showing directly in a toast.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment provider error: {0}")]
    PaymentApi(String),

    #[error("Payment provider not connected")]
    PaymentNotConnected,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Marker used in `PaymentApi` errors when the provider rejects our token.
    pub const PAYMENT_TOKEN_ERROR: &'static str = "Payment provider rejected access token";

    /// True if this error means the stored provider tokens are unusable.
    pub fn is_payment_token_error(&self) -> bool {
        match self {
            AppError::PaymentApi(msg) => {
                msg == Self::PAYMENT_TOKEN_ERROR || msg.contains("invalid_grant")
            }
            AppError::PaymentNotConnected => true,
            _ => false,
        }
    }

    /// Localized message shown to the operator.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "Du må logge inn.",
            AppError::NotFound(_) => "Fant ikke det du lette etter.",
            AppError::BadRequest(_) => "Ugyldig forespørsel.",
            AppError::Validation(_) => "Noen av feltene er ikke gyldige.",
            AppError::Conflict(_) => "Dette finnes allerede.",
            AppError::PaymentApi(_) => "Kunne ikke kontakte betalingsleverandøren.",
            AppError::PaymentNotConnected => "Betalingsterminalen er ikke koblet til.",
            AppError::Database(_) => "Kunne ikke lagre eller hente data. Prøv igjen.",
            AppError::Internal(_) => "Noe gikk galt. Prøv igjen.",
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                Some(msg.clone()),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::PaymentApi(msg) => {
                tracing::warn!(error = %msg, "Payment provider error");
                (StatusCode::BAD_GATEWAY, "payment_error", Some(msg.clone()))
            }
            AppError::PaymentNotConnected => (
                StatusCode::PRECONDITION_FAILED,
                "payment_not_connected",
                None,
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message: self.user_message().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
