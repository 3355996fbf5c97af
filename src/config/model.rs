//! Model source configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the base checkpoint and adapter come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Hub identifier of the base causal language model
    #[serde(default = "default_base_model")]
    pub base_model: String,

    /// Local directory with the base checkpoint (config.json, weights,
    /// tokenizer files). When set, the hub is never contacted.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// Directory holding the fine-tuned adapter
    /// (adapter_config.json + adapter_model.safetensors).
    /// None runs the bare base model.
    #[serde(default = "default_adapter_dir")]
    pub adapter_dir: Option<PathBuf>,

    /// Device to run on ("cpu", "cuda", "cuda:1", ...)
    #[serde(default = "default_device")]
    pub device: String,

    /// Data type for inference (f32 for stability on CPU)
    #[serde(default = "default_dtype")]
    pub dtype: String,
}

fn default_base_model() -> String {
    "ai-forever/rugpt3small_based_on_gpt2".to_string()
}

fn default_adapter_dir() -> Option<PathBuf> {
    Some(PathBuf::from("./final_model"))
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_dtype() -> String {
    "f32".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_model: default_base_model(),
            model_dir: None,
            adapter_dir: default_adapter_dir(),
            device: default_device(),
            dtype: default_dtype(),
        }
    }
}

impl ModelConfig {
    /// CUDA device index when the device string names one
    pub fn cuda_index(&self) -> Option<usize> {
        let rest = self.device.strip_prefix("cuda")?;
        match rest.strip_prefix(':') {
            Some(idx) => idx.parse().ok(),
            None if rest.is_empty() => Some(0),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cuda_index() {
        let mut config = ModelConfig::default();
        assert_eq!(config.cuda_index(), None);

        config.device = "cuda".to_string();
        assert_eq!(config.cuda_index(), Some(0));

        config.device = "cuda:1".to_string();
        assert_eq!(config.cuda_index(), Some(1));

        config.device = "cudnn".to_string();
        assert_eq!(config.cuda_index(), None);
    }
}
