//! Generation configuration settings

use serde::{Deserialize, Serialize};

/// Configuration for quiz text generation
///
/// Defaults mirror the decoding parameters the adapter was tuned for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum total sequence length, prompt included
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Number of sampled candidate sequences; the candidate with the best
    /// length-normalized log-probability is returned
    #[serde(default = "default_num_beams")]
    pub num_beams: usize,

    /// Temperature for sampling (higher = more random)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Repetition penalty (1.0 = no penalty)
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,

    /// Maximum prompt length in tokens; longer prompts are truncated
    #[serde(default = "default_max_prompt_tokens")]
    pub max_prompt_tokens: usize,

    /// Random seed (None = random per request)
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_length() -> usize {
    1024
}

fn default_num_beams() -> usize {
    3
}

fn default_temperature() -> f64 {
    0.8
}

fn default_repetition_penalty() -> f32 {
    1.2
}

fn default_max_prompt_tokens() -> usize {
    512
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            num_beams: default_num_beams(),
            temperature: default_temperature(),
            repetition_penalty: default_repetition_penalty(),
            max_prompt_tokens: default_max_prompt_tokens(),
            seed: None,
        }
    }
}

impl GenerationConfig {
    /// New-token budget left after the prompt
    pub fn max_new_tokens(&self, prompt_len: usize) -> usize {
        self.max_length.saturating_sub(prompt_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GenerationConfig::default();
        assert_eq!(config.max_length, 1024);
        assert_eq!(config.num_beams, 3);
        assert_eq!(config.temperature, 0.8);
        assert_eq!(config.repetition_penalty, 1.2);
        assert_eq!(config.max_prompt_tokens, 512);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_max_new_tokens() {
        let config = GenerationConfig::default();
        assert_eq!(config.max_new_tokens(512), 512);
        assert_eq!(config.max_new_tokens(1024), 0);
        assert_eq!(config.max_new_tokens(2000), 0);
    }
}
