//! Typed errors for the HTTP layer
//!
//! Both kinds surface as HTTP 500 with a plain-text reason, preserving the
//! wire contract the frontend expects.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Model load failed; left unset and retried on the next request
    #[error("Модель не загружена: {0}")]
    ModelUnavailable(String),

    /// Request parsing, tokenization or inference failed
    #[error("Ошибка генерации: {0}")]
    Generation(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        tracing::error!("{message}");
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}
