//! Error codes and the JSON error response shared by every API route.
//!
//! DESIGN
//! ======
//! Each error enum implements `ErrorCode` so the HTTP layer can render a
//! stable machine-readable code next to the human message. Field-level
//! validation failures travel in `fields`, keyed by form field name.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

/// Stable code plus HTTP status for an error surfaced to API callers.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<&'static str, String>,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), fields: BTreeMap::new() }
    }

    #[must_use]
    pub fn from_code(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::new(err.status(), err.error_code(), err.to_string())
    }

    #[must_use]
    pub fn with_fields(mut self, fields: BTreeMap<&'static str, String>) -> Self {
        self.fields = fields;
        self
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHENTICATED", "sign in required")
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "E_BAD_REQUEST", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
