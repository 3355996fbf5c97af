//! CLI commands

mod generate;
mod pull;
mod serve;

pub use generate::generate;
pub use pull::pull;
pub use serve::serve;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::QuizgenConfig;

/// Quizgen - quiz generation service backed by an adapter-tuned language model
#[derive(Parser)]
#[command(name = "quizgen")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a YAML or JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the generation server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Load the model at startup instead of on the first request
        #[arg(long)]
        preload: bool,
    },

    /// Generate a quiz once and print it (no server)
    Generate {
        /// Source text (reads stdin when omitted)
        #[arg(long, short)]
        text: Option<String>,

        /// Number of questions
        #[arg(long, short, default_value = "5")]
        questions: u32,

        /// Difficulty label embedded in the prompt
        #[arg(long, short, default_value = "легкий")]
        difficulty: String,
    },

    /// Prefetch the base checkpoint from the HuggingFace Hub
    Pull {
        /// Repository ID (defaults to the configured base model)
        #[arg(long)]
        repo: Option<String>,

        /// Output directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// Load the config file if one was given, defaults otherwise
pub fn load_config(path: &Option<PathBuf>) -> Result<QuizgenConfig> {
    match path {
        Some(path) => QuizgenConfig::from_file(path),
        None => Ok(QuizgenConfig::default()),
    }
}
