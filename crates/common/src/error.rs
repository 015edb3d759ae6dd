//! Error types for civicdesk.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Verification Errors ===
    #[error("Verification session not found")]
    SessionNotFound,

    #[error("Verification code has expired, request a new one")]
    SessionExpired,

    #[error("Too many incorrect attempts, request a new code")]
    AttemptsExceeded,

    #[error("Incorrect verification code, {remaining_attempts} attempt(s) remaining")]
    CodeMismatch {
        /// Attempts left before the session is destroyed.
        remaining_attempts: u32,
    },

    #[error("Verification token is invalid or has already been used")]
    InvalidToken,

    #[error("Contact email does not match the verified email")]
    IdentityMismatch,

    #[error("Failed to deliver verification code: {0}")]
    DeliveryError(String),

    // === Lifecycle Errors ===
    #[error("Cannot change status from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    #[error("Complaint has not been resolved yet")]
    NotResolved,

    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Complaint not found: {0}")]
    ComplaintNotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::SessionNotFound
            | Self::NotFound(_)
            | Self::UserNotFound(_)
            | Self::ComplaintNotFound(_) => StatusCode::NOT_FOUND,
            Self::SessionExpired => StatusCode::GONE,
            Self::AttemptsExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::CodeMismatch { .. } | Self::InvalidToken | Self::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            Self::IdentityMismatch | Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. } | Self::NotResolved | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }

            // 5xx Server Errors
            Self::DeliveryError(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::AttemptsExceeded => "ATTEMPTS_EXCEEDED",
            Self::CodeMismatch { .. } => "CODE_MISMATCH",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::IdentityMismatch => "IDENTITY_MISMATCH",
            Self::DeliveryError(_) => "DELIVERY_ERROR",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotResolved => "NOT_RESOLVED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::ComplaintNotFound(_) => "COMPLAINT_NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Message safe to show to callers.
    ///
    /// Server-side failures never expose storage or configuration details.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::DeliveryError(_) => "Failed to deliver verification code".to_string(),
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Attempts left after a failed verification, if applicable.
    #[must_use]
    pub const fn remaining_attempts(&self) -> Option<u32> {
        match self {
            Self::CodeMismatch { remaining_attempts } => Some(*remaining_attempts),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log server errors
        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let mut error = json!({
            "code": code,
            "message": self.public_message(),
        });
        if let Some(remaining) = self.remaining_attempts() {
            error["remainingAttempts"] = json!(remaining);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::ExpiredSignature
            | ErrorKind::InvalidIssuer
            | ErrorKind::ImmatureSignature => Self::Unauthorized,
            _ => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_verification_errors_are_client_errors() {
        for err in [
            AppError::SessionNotFound,
            AppError::SessionExpired,
            AppError::AttemptsExceeded,
            AppError::CodeMismatch {
                remaining_attempts: 2,
            },
            AppError::InvalidToken,
            AppError::IdentityMismatch,
        ] {
            assert!(!err.is_server_error(), "{err:?} should be a client error");
        }
    }

    #[test]
    fn test_public_message_hides_storage_details() {
        let err = AppError::Database("relation \"complaint\" does not exist".to_string());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::DeliveryError("smtp: connection refused".to_string());
        assert_eq!(err.public_message(), "Failed to deliver verification code");
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = AppError::InvalidTransition {
            from: "closed".to_string(),
            to: "in_progress".to_string(),
        };
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert_eq!(err.to_string(), "Cannot change status from closed to in_progress");
    }

    #[tokio::test]
    async fn test_code_mismatch_response_carries_hint() {
        let response = AppError::CodeMismatch {
            remaining_attempts: 1,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"]["code"], "CODE_MISMATCH");
        assert_eq!(value["error"]["remainingAttempts"], 1);
    }
}
