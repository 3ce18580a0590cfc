//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::FetchError;

/// Errors a handler can return; each maps to one status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service not configured")]
    NotConfigured(Vec<&'static str>),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Fetch(e) => match e {
                FetchError::Authentication { .. } => StatusCode::UNAUTHORIZED,
                FetchError::Transient { .. } => StatusCode::SERVICE_UNAVAILABLE,
                FetchError::InvalidWindow(_) => StatusCode::BAD_REQUEST,
                FetchError::Request { .. } => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::NotConfigured(missing) => json!({
                "error": self.to_string(),
                "message": format!("Missing credentials for: {}", missing.join(", ")),
                "missing": missing,
            }),
            Self::BadRequest(message) => json!({
                "error": "Invalid request",
                "message": message,
            }),
            Self::Internal(message) => json!({
                "error": "Internal server error",
                "message": message,
            }),
            Self::Fetch(FetchError::Transient {
                retry_after: Some(after),
                ..
            }) => json!({
                "error": "Mailbox fetch failed",
                "message": self.to_string(),
                "retry_after_secs": after.as_secs(),
            }),
            Self::Fetch(_) => json!({
                "error": "Mailbox fetch failed",
                "message": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}
