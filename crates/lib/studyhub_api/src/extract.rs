//! JSON body extractors whose rejections use the API's own error bodies.
//!
//! A malformed, mistyped or non-JSON body is the caller's mistake, so every
//! rejection becomes a 400 in the endpoint's error shape.

use axum::extract::FromRequest;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use crate::error::{AppError, FunctionError};

/// JSON body for the admin endpoints; rejections are [`AppError::Validation`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AdminJson<T>(pub T);

/// JSON body for the function RPCs; rejections are `400 {error}`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(FunctionError))]
pub struct FunctionJson<T>(pub T);

fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => {
            "Expected a JSON body with Content-Type: application/json".to_string()
        }
        other => format!("Invalid request body: {}", other.body_text()),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection_message(&rejection))
    }
}

impl From<JsonRejection> for FunctionError {
    fn from(rejection: JsonRejection) -> Self {
        FunctionError::new(StatusCode::BAD_REQUEST, rejection_message(&rejection))
    }
}
