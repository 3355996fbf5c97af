//! HTTP server command

use std::sync::Arc;

use anyhow::Result;

use crate::config::QuizgenConfig;
use crate::engine::Engine;
use crate::server::{self, AppState};

/// Start the generation server
pub async fn serve(
    mut config: QuizgenConfig,
    port: Option<u16>,
    host: Option<String>,
    preload: bool,
) -> Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    let state = if preload {
        tracing::info!("Pre-loading model: {}", config.model.base_model);
        let load_config = config.clone();
        let engine = tokio::task::spawn_blocking(move || Engine::load(&load_config)).await??;
        tracing::info!("Model loaded successfully");
        Arc::new(AppState::with_engine(config, Arc::new(engine)))
    } else {
        Arc::new(AppState::new(config))
    };

    server::start(state).await
}
