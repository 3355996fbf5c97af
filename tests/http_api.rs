//! Black-box tests of the HTTP contract.
//!
//! The model directory is pointed at a nonexistent path so the lazy load
//! fails fast and deterministically; everything up to the model boundary is
//! exercised for real.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use quizgen::config::{ModelConfig, QuizgenConfig};
use quizgen::server::{self, AppState};

fn unavailable_config() -> QuizgenConfig {
    QuizgenConfig {
        model: ModelConfig {
            model_dir: Some("/nonexistent/quizgen-model".into()),
            adapter_dir: None,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn test_app() -> axum::Router {
    server::app(Arc::new(AppState::new(unavailable_config())))
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("test");
    String::from_utf8(bytes.to_vec()).expect("test")
}

#[tokio::test]
async fn test_health() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .expect("test"),
        )
        .await
        .expect("test");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_on_generate_route_is_404() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/generate")
                .body(Body::empty())
                .expect("test"),
        )
        .await
        .expect("test");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/anything-else")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .expect("test"),
        )
        .await
        .expect("test");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_preflight_has_cors_headers_and_no_body() {
    for uri in ["/api/generate", "/somewhere/else"] {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri(uri)
                    .header(header::ORIGIN, "http://localhost:3000")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .expect("test"),
            )
            .await
            .expect("test");
        assert_eq!(response.status(), StatusCode::OK, "preflight to {uri}");

        let headers = response.headers().clone();
        assert_eq!(
            headers
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .expect("test"),
            "*"
        );
        let methods = headers
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .expect("test")
            .to_str()
            .expect("test")
            .to_string();
        assert!(methods.contains("POST"));
        assert!(methods.contains("OPTIONS"));
        let allowed = headers
            .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
            .expect("test")
            .to_str()
            .expect("test")
            .to_lowercase();
        assert!(allowed.contains("content-type"));

        assert!(body_string(response).await.is_empty());
    }
}

#[tokio::test]
async fn test_failed_model_load_gives_500_on_every_request() {
    let app = test_app();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/generate")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"text": "абв", "questionCount": 2}"#))
                    .expect("test"),
            )
            .await
            .expect("test");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        // plain-text reason, not the JSON response shape
        let body = body_string(response).await;
        assert!(body.contains("Модель не загружена"), "body: {body}");
        assert!(serde_json::from_str::<serde_json::Value>(&body).is_err());
    }
}

#[tokio::test]
async fn test_malformed_json_body_is_500_not_a_crash() {
    let response = test_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .expect("test"),
        )
        .await
        .expect("test");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
