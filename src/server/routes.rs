//! Route definitions

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, AppState};

/// The API router.
///
/// A method fallback on the generation route turns non-POST requests into
/// 404 (instead of axum's 405), matching the contract the frontend was
/// built against.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/generate",
            post(handlers::generate).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
}
