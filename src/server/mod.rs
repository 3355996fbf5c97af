//! HTTP server for quiz generation
//!
//! Single generation route plus CORS preflight handling and a health check.

mod error;
mod handlers;
mod routes;

use std::sync::Arc;

use anyhow::Result;
use axum::http::{header, Method};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ServerError;
pub use handlers::{AppState, GenerateRequest, GenerateResponse};
pub use routes::api_routes;

/// Build the application router with CORS and tracing layers.
///
/// The CORS layer answers preflights for any path with 200 plus wildcard
/// origin, `POST, OPTIONS` methods and the `Content-Type` header, and adds
/// the wildcard origin to generation responses.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let request_logging = state.config().server.request_logging;

    let mut app = Router::new()
        .merge(api_routes())
        .layer(cors)
        .with_state(state);
    if request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

/// Start the HTTP server
pub async fn start(state: Arc<AppState>) -> Result<()> {
    let addr = state.config().server.addr();
    let app = app(state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /health       - Health check");
    tracing::info!("  POST /api/generate - Quiz generation");

    axum::serve(listener, app).await?;

    Ok(())
}
