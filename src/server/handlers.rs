//! HTTP request handlers

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::{OnceCell, Semaphore};

use super::error::ServerError;
use crate::config::QuizgenConfig;
use crate::engine::{prompt, Engine};

/// Shared application state
///
/// The engine cell is the process-wide model state: set at most once, a
/// failed load leaves it empty so the next request retries.
pub struct AppState {
    config: QuizgenConfig,
    engine: OnceCell<Arc<Engine>>,
    inference: Semaphore,
}

impl AppState {
    pub fn new(config: QuizgenConfig) -> Self {
        let permits = config.server.max_concurrent_requests.max(1);
        Self {
            config,
            engine: OnceCell::new(),
            inference: Semaphore::new(permits),
        }
    }

    /// State with an eagerly loaded engine (`serve --preload`)
    pub fn with_engine(config: QuizgenConfig, engine: Arc<Engine>) -> Self {
        let permits = config.server.max_concurrent_requests.max(1);
        Self {
            config,
            engine: OnceCell::new_with(Some(engine)),
            inference: Semaphore::new(permits),
        }
    }

    pub fn config(&self) -> &QuizgenConfig {
        &self.config
    }

    async fn ensure_engine(&self) -> Result<Arc<Engine>, ServerError> {
        self.engine
            .get_or_try_init(|| async {
                tracing::info!("loading model on first request");
                let config = self.config.clone();
                let engine = tokio::task::spawn_blocking(move || Engine::load(&config))
                    .await
                    .map_err(|e| ServerError::ModelUnavailable(e.to_string()))?
                    .map_err(|e| ServerError::ModelUnavailable(format!("{e:#}")))?;
                tracing::info!("model ready");
                Ok(Arc::new(engine))
            })
            .await
            .cloned()
    }
}

/// Generation request body; every field falls back to its default
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateRequest {
    pub text: String,
    pub question_count: u32,
    pub difficulty: String,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            question_count: 5,
            difficulty: "легкий".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub generated_test: String,
    pub message: String,
}

/// `POST /api/generate`
///
/// The body is taken as raw bytes and parsed here so malformed JSON surfaces
/// as a 500 plain-text error, not an extractor rejection.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let engine = state.ensure_engine().await?;

    let request: GenerateRequest = serde_json::from_slice(&body)
        .map_err(|e| ServerError::Generation(format!("invalid request body: {e}")))?;

    let request_id = uuid::Uuid::new_v4();
    tracing::info!(
        %request_id,
        question_count = request.question_count,
        difficulty = %request.difficulty,
        text_len = request.text.len(),
        "generation request"
    );

    let _permit = state
        .inference
        .acquire()
        .await
        .map_err(|e| ServerError::Generation(e.to_string()))?;
    let generated = tokio::task::spawn_blocking(move || {
        engine.generate_quiz(&request.text, request.question_count, &request.difficulty)
    })
    .await
    .map_err(|e| ServerError::Generation(e.to_string()))?
    .map_err(|e| ServerError::Generation(format!("{e:#}")))?;

    tracing::info!(%request_id, chars = generated.len(), "generation complete");

    Ok(Json(GenerateResponse {
        success: true,
        generated_test: generated,
        message: prompt::SUCCESS_MESSAGE.to_string(),
    }))
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Fallback for unknown paths and wrong methods
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: GenerateRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.text, "");
        assert_eq!(request.question_count, 5);
        assert_eq!(request.difficulty, "легкий");
    }

    #[test]
    fn test_request_camel_case_fields() {
        let request: GenerateRequest =
            serde_json::from_str(r#"{"text": "абв", "questionCount": 3, "difficulty": "сложный"}"#)
                .unwrap();
        assert_eq!(request.text, "абв");
        assert_eq!(request.question_count, 3);
        assert_eq!(request.difficulty, "сложный");
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        assert!(serde_json::from_str::<GenerateRequest>("{not json").is_err());
    }

    #[test]
    fn test_response_serializes_expected_keys() {
        let response = GenerateResponse {
            success: true,
            generated_test: "1. Вопрос?".to_string(),
            message: prompt::SUCCESS_MESSAGE.to_string(),
        };
        let value = serde_json::to_value(&response).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        for key in ["success", "generatedTest", "message"] {
            assert!(object.contains_key(key), "missing key {key}");
        }
    }
}
