//! One-shot generation command

use std::io::Read;

use anyhow::Result;

use crate::config::QuizgenConfig;
use crate::engine::Engine;

/// Generate a quiz once and print it to stdout
pub async fn generate(
    config: QuizgenConfig,
    text: Option<String>,
    questions: u32,
    difficulty: String,
) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    tracing::info!("Loading model: {}", config.model.base_model);
    let engine = tokio::task::spawn_blocking(move || Engine::load(&config)).await??;
    tracing::info!("Model ready");

    let start = std::time::Instant::now();
    let quiz =
        tokio::task::spawn_blocking(move || engine.generate_quiz(&text, questions, &difficulty))
            .await??;
    tracing::info!("Generated in {:.2}s", start.elapsed().as_secs_f64());

    println!("{quiz}");
    Ok(())
}
