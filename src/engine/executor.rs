//! Inference executor
//!
//! One engine per process. Generation runs `num_beams` independently seeded
//! sampled rollouts and keeps the candidate with the best length-normalized
//! log-probability.

use anyhow::{Context, Result};
use candle_core::{Device, IndexOp, Tensor, D};
use candle_transformers::generation::LogitsProcessor;

use crate::config::{GenerationConfig, QuizgenConfig};
use crate::engine::prompt;
use crate::loader;
use crate::model::{Gpt2Model, KvCache};
use crate::tokenizer::QuizTokenizer;

/// A fully loaded model plus everything needed to serve one request
pub struct Engine {
    model: Gpt2Model,
    tokenizer: QuizTokenizer,
    device: Device,
    generation: GenerationConfig,
    eos_token_id: Option<u32>,
}

impl Engine {
    /// Load the base checkpoint, merge the adapter and build the engine.
    ///
    /// Blocking and heavy: network fetch on a cold cache, full weight read,
    /// adapter merge. Callers on an async runtime must use spawn_blocking.
    pub fn load(config: &QuizgenConfig) -> Result<Self> {
        let device = loader::device(&config.model)?;
        let (model, model_config, tokenizer) = loader::load_model(&config.model, &device)
            .with_context(|| format!("loading {}", config.model.base_model))?;

        // checkpoint config is the fallback when the vocab has no EOS marker
        let eos_token_id = tokenizer.eos_token_id().or(model_config.eos_token_id);
        if eos_token_id.is_none() {
            tracing::warn!("no EOS token found; rollouts always run to the length cap");
        }

        Ok(Self {
            model,
            tokenizer,
            device,
            generation: config.generation.clone(),
            eos_token_id,
        })
    }

    pub fn tokenizer(&self) -> &QuizTokenizer {
        &self.tokenizer
    }

    /// Generate quiz text for a source text and parameters.
    ///
    /// Implements the full request path: prompt, tokenize (truncated),
    /// rollouts, decode, prompt strip, fallback on empty output.
    pub fn generate_quiz(&self, text: &str, question_count: u32, difficulty: &str) -> Result<String> {
        let prompt_text = prompt::build_prompt(text, question_count, difficulty);
        let prompt_tokens = self
            .tokenizer
            .encode(&prompt_text, self.generation.max_prompt_tokens)?;

        let max_new_tokens = self.generation.max_new_tokens(prompt_tokens.len());
        if prompt_tokens.is_empty() || max_new_tokens == 0 {
            tracing::debug!(
                prompt_tokens = prompt_tokens.len(),
                "no token budget left, returning fallback"
            );
            return Ok(prompt::FALLBACK_MESSAGE.to_string());
        }

        let base_seed = self.generation.seed.unwrap_or_else(rand::random);
        let num_beams = self.generation.num_beams.max(1);

        let mut best: Option<(f32, Vec<u32>)> = None;
        for beam in 0..num_beams {
            let seed = base_seed.wrapping_add(beam as u64);
            let (tokens, score) = self
                .sample_candidate(&prompt_tokens, max_new_tokens, seed)
                .with_context(|| format!("rollout {beam} failed"))?;
            tracing::debug!(beam, score, tokens = tokens.len(), "rollout complete");
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, tokens));
            }
        }
        let (_, generated) = best.unwrap_or_default();

        // decode prompt + continuation together, then strip the echo; this
        // mirrors decoding the whole output sequence of the original model
        let mut full = prompt_tokens;
        full.extend_from_slice(&generated);
        let decoded = self.tokenizer.decode(&full)?;

        Ok(prompt::strip_prompt(&decoded, &prompt_text))
    }

    /// One sampled rollout. Returns the generated tokens (prompt excluded)
    /// and their mean log-probability.
    fn sample_candidate(
        &self,
        prompt_tokens: &[u32],
        max_new_tokens: usize,
        seed: u64,
    ) -> Result<(Vec<u32>, f32)> {
        let mut cache: KvCache = self.model.empty_cache();
        let mut logits_processor =
            LogitsProcessor::new(seed, Some(self.generation.temperature), None);

        let mut all_tokens = prompt_tokens.to_vec();
        let mut generated = Vec::new();
        let mut score_sum = 0f32;
        let mut steps = 0usize;

        let input = Tensor::new(prompt_tokens, &self.device)?.unsqueeze(0)?;
        let mut logits = self.model.forward_last(&input, 0, &mut cache)?;

        for _ in 0..max_new_tokens {
            let penalized = if self.generation.repetition_penalty == 1.0 {
                logits.clone()
            } else {
                candle_transformers::utils::apply_repeat_penalty(
                    &logits,
                    self.generation.repetition_penalty,
                    &all_tokens,
                )?
            };

            let next = logits_processor.sample(&penalized)?;
            let log_probs = candle_nn::ops::log_softmax(&penalized, D::Minus1)?;
            score_sum += log_probs.i(next as usize)?.to_scalar::<f32>()?;
            steps += 1;

            if self.eos_token_id == Some(next) {
                break;
            }
            generated.push(next);
            all_tokens.push(next);

            let next_input = Tensor::new(&[next], &self.device)?.unsqueeze(0)?;
            logits = self
                .model
                .forward_last(&next_input, all_tokens.len() - 1, &mut cache)?;
        }

        let mean_score = score_sum / steps.max(1) as f32;
        Ok((generated, mean_score))
    }
}
