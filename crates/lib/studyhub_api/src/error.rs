//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use thiserror::Error;
use tracing::error;

use studyhub_core::auth::{GateDecision, GateNotice, LoginError, ProvisionError};
use studyhub_core::chat::ChatError;
use studyhub_core::content::DispatchError;

use crate::models::{ErrorResponse, FunctionErrorResponse};
use crate::services::cookies::clear_access_cookie;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

const UNAVAILABLE_MESSAGE: &str = "Something went wrong. Please try again.";
const SIGN_IN_MESSAGE: &str = "Please sign in to continue.";

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The gate did not authorize the caller; they must sign in again.
    #[error("Session required")]
    SessionRequired(GateDecision),

    #[error("Admin privileges required")]
    AccessDenied,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable")]
    Unavailable,

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::InvalidCredentials(m) => {
                (StatusCode::UNAUTHORIZED, "invalid_credentials", m.as_str())
            }
            // Outage: the session stays valid.
            AppError::SessionRequired(decision)
                if decision.notice() == Some(GateNotice::Unavailable) =>
            {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "unavailable",
                    UNAVAILABLE_MESSAGE,
                )
            }
            AppError::SessionRequired(decision) => {
                let body = Json(ErrorResponse {
                    error: "unauthorized".into(),
                    message: decision
                        .notice()
                        .map(|n| n.message())
                        .unwrap_or(SIGN_IN_MESSAGE)
                        .into(),
                    redirect: decision.redirect().map(str::to_string),
                });
                let jar = CookieJar::new().add(clear_access_cookie());
                return (StatusCode::UNAUTHORIZED, jar, body).into_response();
            }
            AppError::AccessDenied => (
                StatusCode::FORBIDDEN,
                "access_denied",
                "Admin privileges required",
            ),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                UNAVAILABLE_MESSAGE,
            ),
            AppError::Internal(detail) => {
                error!(error = %detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    UNAVAILABLE_MESSAGE,
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
            redirect: None,
        });
        (status, body).into_response()
    }
}

impl From<LoginError> for AppError {
    fn from(e: LoginError) -> Self {
        match e {
            LoginError::MissingField(_) => AppError::Validation(e.to_string()),
            LoginError::InvalidCredentials(msg) => AppError::InvalidCredentials(msg),
            LoginError::AccessDenied => AppError::AccessDenied,
            LoginError::Unavailable => AppError::Unavailable,
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Forbidden => AppError::Forbidden(e.to_string()),
            DispatchError::SessionExpired { decision } => AppError::SessionRequired(decision),
            DispatchError::NotFound(msg) => AppError::NotFound(msg),
            DispatchError::Store(msg) => AppError::Internal(msg),
        }
    }
}

/// Error from an RPC-style function endpoint: `{ "error": "..." }`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FunctionError {
    pub status: StatusCode,
    pub message: String,
}

impl FunctionError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for FunctionError {
    fn into_response(self) -> Response {
        let body = Json(FunctionErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<ProvisionError> for FunctionError {
    fn from(e: ProvisionError) -> Self {
        let status = match e {
            ProvisionError::BadRequest(_)
            | ProvisionError::Conflict(_)
            | ProvisionError::Provider(_) => StatusCode::BAD_REQUEST,
            ProvisionError::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        FunctionError::new(status, e.to_string())
    }
}

impl From<ChatError> for FunctionError {
    fn from(e: ChatError) -> Self {
        let status = match e {
            ChatError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ChatError::MissingConversation => StatusCode::BAD_REQUEST,
            ChatError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Store(_) | ChatError::Completion(_) => {
                error!(error = %e, "study chat failed");
                return FunctionError::new(StatusCode::INTERNAL_SERVER_ERROR, UNAVAILABLE_MESSAGE);
            }
        };
        FunctionError::new(status, e.to_string())
    }
}
