//! Quizgen - quiz generation over an adapter-tuned language model
//!
//! Quizgen wraps a pretrained causal language model with a merged
//! fine-tuned adapter behind a single HTTP endpoint: send source text plus
//! a question count and difficulty, get back a generated quiz.
//!
//! # Architecture
//!
//! - **loader/model**: checkpoint resolution (local dir or hub), GPT-2 on
//!   candle, LoRA adapter merged into the weights at load time
//! - **engine**: prompt construction, sampled candidate rollouts,
//!   output post-processing
//! - **server**: axum HTTP layer with lazy once-only model state
//!
//! # Example
//!
//! ```bash
//! # Start the server (model loads on the first request)
//! quizgen serve --port 8080
//!
//! # One-shot generation without a server
//! quizgen generate --text "Вода кипит при 100 градусах." --questions 3
//!
//! # Prefetch the base checkpoint for offline use
//! quizgen pull --output ./models/rugpt3small
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod loader;
pub mod model;
pub mod server;
pub mod tokenizer;

// Re-export key types
pub use config::{GenerationConfig, ModelConfig, QuizgenConfig, ServerConfig};
pub use engine::Engine;
pub use server::{AppState, ServerError};
