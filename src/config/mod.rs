//! Configuration system for quizgen
//!
//! QuizgenConfig bundles the model source, generation parameters and server
//! settings. Every field has a default so an empty config file (or none at
//! all) yields a runnable service.

mod generation;
mod model;
mod server;

pub use generation::GenerationConfig;
pub use model::ModelConfig;
pub use server::ServerConfig;

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Quizgen configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizgenConfig {
    /// Model source settings (checkpoint, adapter, device)
    #[serde(default)]
    pub model: ModelConfig,

    /// Decoding parameters
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Server settings (only for `quizgen serve`)
    #[serde(default)]
    pub server: ServerConfig,
}

impl QuizgenConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load from a path, dispatching on the extension (defaults to YAML)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            _ => Self::from_yaml(path),
        }
    }
}
