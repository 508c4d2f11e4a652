//! Error types and handling
//!
//! Request-level failures are translated into a bare status code and a short
//! plain-text body. Details stay in the logs so that a webhook sender never
//! learns anything about the command tree behind the endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use crate::services::payload::PayloadError;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// The request carried no body at all (400)
    #[error("Missing request body")]
    MissingBody,

    /// Malformed, unreadable or oversized request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing, malformed or invalid signature (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    /// Status code sent back to the caller
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingBody | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Public response body; never includes the detail message
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::MissingBody => "missing request body",
            AppError::BadRequest(_) => "bad request body",
            AppError::Unauthorized(_) => "unauthorized",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(error = %self, status = status.as_u16(), "Rejected webhook request");

        (status, self.public_message()).into_response()
    }
}

impl From<PayloadError> for AppError {
    fn from(err: PayloadError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
