//! HTTP error mapping for webhook handlers

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hook_api::ErrorResponse;
use tracing::error;

/// A failed request: status code plus the JSON error envelope
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, body: ErrorResponse) -> Self {
        Self { status, body }
    }

    pub fn not_found(body: ErrorResponse) -> Self {
        Self::new(StatusCode::NOT_FOUND, body)
    }

    pub fn conflict(body: ErrorResponse) -> Self {
        Self::new(StatusCode::CONFLICT, body)
    }

    pub fn deployment_failed(body: ErrorResponse) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, body)
    }

    /// An unexpected error; `detail` is only shown when `expose` is set
    pub fn internal(detail: impl Into<String>, expose: bool) -> Self {
        let detail = detail.into();
        error!(error = %detail, "Internal server error");
        let mut body = ErrorResponse::new("Internal server error");
        body.error = Some(if expose {
            detail
        } else {
            "Something went wrong".to_string()
        });
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, body)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &ErrorResponse {
        &self.body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Render a handler panic as an internal error response
pub fn panic_response(panic: Box<dyn Any + Send + 'static>, expose: bool) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::internal(detail, expose).into_response()
}
