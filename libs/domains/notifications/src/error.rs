//! Error types for the notifications domain.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Result type for notification operations.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in the notifications domain.
///
/// Delivery failures never escape the queue processor as errors; they are
/// recorded on the queue entry instead. These values surface from the
/// transport, the repositories and the admin endpoints.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Rejected input (transport settings, addresses).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connect, TLS, auth or SMTP-level rejection.
    #[error("SMTP transport error: {0}")]
    Transport(String),

    /// The SMTP exchange did not finish within the configured bound.
    #[error("SMTP operation timed out after {0}s")]
    Timeout(u64),

    /// Recipient or sender address could not be parsed.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template registration or rendering failed.
    #[error("Template rendering error: {0}")]
    Template(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotificationError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            NotificationError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            NotificationError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "INVALID_ADDRESS"),
            NotificationError::Transport(_) => (StatusCode::BAD_GATEWAY, "SMTP_ERROR"),
            NotificationError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "SMTP_TIMEOUT"),
            NotificationError::Template(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "TEMPLATE_ERROR")
            }
            NotificationError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
            }
            NotificationError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error_code = code, error = %self, "Admin request failed");
        } else {
            tracing::info!(error_code = code, error = %self, "Admin request rejected");
        }

        let body = Json(json!({
            "error": code,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

impl From<sea_orm::DbErr> for NotificationError {
    fn from(err: sea_orm::DbErr) -> Self {
        NotificationError::Database(err.to_string())
    }
}

impl From<handlebars::RenderError> for NotificationError {
    fn from(err: handlebars::RenderError) -> Self {
        NotificationError::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for NotificationError {
    fn from(err: handlebars::TemplateError) -> Self {
        NotificationError::Template(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for NotificationError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        NotificationError::Transport(err.to_string())
    }
}

impl From<lettre::address::AddressError> for NotificationError {
    fn from(err: lettre::address::AddressError) -> Self {
        NotificationError::InvalidAddress(err.to_string())
    }
}

impl From<lettre::error::Error> for NotificationError {
    fn from(err: lettre::error::Error) -> Self {
        NotificationError::Transport(format!("Failed to build message: {}", err))
    }
}

impl From<validator::ValidationErrors> for NotificationError {
    fn from(err: validator::ValidationErrors) -> Self {
        NotificationError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Internal(format!("JSON serialization error: {}", err))
    }
}
