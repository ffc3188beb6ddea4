//! API error type and its JSON rendering.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use consilium_core::{FieldErrors, StoreError};

use crate::ai::AiError;

pub const AI_RATE_LIMITED: &str = "AI service rate limit exceeded. Please try again later.";
pub const AI_INVALID_INPUT: &str = "Invalid input data. Please check your request.";
pub const AI_UNAVAILABLE: &str = "Service temporarily unavailable. Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("throttled for {retry_after}s")]
    RateLimited { retry_after: u64 },
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found() -> Self {
        Self::NotFound("Not found.".into())
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::Validation(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(errors) => {
                return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
            }
            ApiError::RateLimited { retry_after } => {
                let body = Json(json!({
                    "error": format!(
                        "Request was throttled. Expected available in {retry_after} seconds."
                    )
                }));
                let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                return response;
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Unavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(errors) => Self::Validation(errors),
            StoreError::NotFound(_) => Self::not_found(),
            StoreError::InvalidCredentials => Self::Unauthorized("Invalid credentials".into()),
            StoreError::AccountDisabled => Self::Unauthorized("User account is disabled".into()),
            StoreError::InvalidToken => {
                Self::Unauthorized("Token is invalid or expired".into())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::NotConfigured => {
                tracing::warn!("AI request received but no provider key is configured");
                Self::Unavailable(AI_UNAVAILABLE.into())
            }
            AiError::RateLimited(detail) => {
                tracing::warn!(detail = %detail, "AI provider throttled the request");
                Self::Unavailable(AI_RATE_LIMITED.into())
            }
            AiError::InvalidRequest(detail) | AiError::InvalidResponse(detail) => {
                tracing::warn!(detail = %detail, "AI request or response rejected");
                Self::BadRequest(AI_INVALID_INPUT.into())
            }
            AiError::Unavailable(detail) => {
                tracing::error!(detail = %detail, "AI provider unavailable");
                Self::Unavailable(AI_UNAVAILABLE.into())
            }
        }
    }
}
