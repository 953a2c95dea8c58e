// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::store::StoreError;

/// Why authentication failed. Each kind has a stable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingCredential,
    InvalidCredential,
    ExpiredCredential,
    /// The user changed their password after the token was issued
    StaleCredential,
    /// The token names a user that no longer exists or is inactive
    UnknownPrincipal,
}

impl AuthFailure {
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredential => "MISSING_CREDENTIAL",
            AuthFailure::InvalidCredential => "INVALID_CREDENTIAL",
            AuthFailure::ExpiredCredential => "EXPIRED_CREDENTIAL",
            AuthFailure::StaleCredential => "STALE_CREDENTIAL",
            AuthFailure::UnknownPrincipal => "UNKNOWN_PRINCIPAL",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredential => "You are not logged in. Please log in to get access.",
            AuthFailure::InvalidCredential => "Invalid token. Please log in again.",
            AuthFailure::ExpiredCredential => "Your token has expired. Please log in again.",
            AuthFailure::StaleCredential => "User recently changed password. Please log in again.",
            AuthFailure::UnknownPrincipal => "The user belonging to this token no longer exists.",
        }
    }
}

pub type FieldErrors = BTreeMap<String, String>;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug, Error)]
pub enum ApiError {
    // 400 Bad Request
    #[error("{message}")]
    ValidationError { message: String, field_errors: FieldErrors },

    #[error("{0}")]
    BadRequest(String),

    // 401 Unauthorized
    #[error("{}", .0.message())]
    Unauthorized(AuthFailure),

    // 403 Forbidden
    #[error("{0}")]
    Forbidden(String),

    // 404 Not Found
    #[error("{0}")]
    NotFound(String),

    // 503 when transient, 500 otherwise
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    // 500 Internal Server Error
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Store(e) if e.is_transient() => "STORE_UNAVAILABLE",
            ApiError::Store(_) => "STORE_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> String {
        match self {
            // Don't expose store internals to clients
            ApiError::Store(e) if e.is_transient() => "Service temporarily unavailable, please try again".to_string(),
            ApiError::Store(_) | ApiError::Internal(_) => "Something went wrong".to_string(),
            other => other.to_string(),
        }
    }

    /// `fail` for caller mistakes, `error` for server faults
    pub fn status_label(&self) -> &'static str {
        if self.status_code().is_server_error() {
            "error"
        } else {
            "fail"
        }
    }

    /// Convert to JSON response body. `expose_details` is the debug posture:
    /// only then does the underlying store/internal error text appear.
    pub fn to_json(&self, expose_details: bool) -> Value {
        let mut body = json!({
            "status": self.status_label(),
            "code": self.error_code(),
            "message": self.message(),
        });

        match self {
            ApiError::ValidationError { field_errors, .. } => {
                body["errors"] = json!(field_errors);
            }
            ApiError::Unauthorized(kind) => {
                body["kind"] = json!(kind.code());
            }
            ApiError::Store(e) if expose_details => {
                body["detail"] = json!(e.to_string());
            }
            ApiError::Internal(detail) if expose_details => {
                body["detail"] = json!(detail);
            }
            _ => {}
        }
        body
    }

    /// Log server-side faults; caller mistakes are not worth an error line
    pub fn log(&self) {
        match self {
            ApiError::Store(e) => tracing::error!("Store error: {}", e),
            ApiError::Internal(detail) => tracing::error!("Internal error: {}", detail),
            ApiError::Unauthorized(kind) => tracing::warn!("Authentication failed: {}", kind.code()),
            ApiError::Forbidden(msg) => tracing::warn!("Forbidden: {}", msg),
            _ => tracing::debug!("Request failed: {}", self),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation_error(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(kind: AuthFailure) -> Self {
        ApiError::Unauthorized(kind)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<crate::auth::JwtError> for ApiError {
    fn from(err: crate::auth::JwtError) -> Self {
        match err {
            crate::auth::JwtError::Expired => ApiError::unauthorized(AuthFailure::ExpiredCredential),
            crate::auth::JwtError::Invalid(_) => ApiError::unauthorized(AuthFailure::InvalidCredential),
            crate::auth::JwtError::InvalidSecret | crate::auth::JwtError::TokenGeneration(_) => {
                ApiError::internal(err.to_string())
            }
        }
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        self.log();
        let expose = crate::config::config().security.expose_error_details;
        (self.status_code(), Json(self.to_json(expose))).into_response()
    }
}
