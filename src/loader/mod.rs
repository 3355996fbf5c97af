//! Checkpoint loading
//!
//! Resolves the base checkpoint files either from a local directory or from
//! the HuggingFace Hub, reads the weights (safetensors or PyTorch pickle),
//! folds the adapter in, and builds the model and tokenizer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use hf_hub::api::sync::Api;

use crate::config::ModelConfig;
use crate::model::{self, Gpt2Config, Gpt2Model};
use crate::tokenizer::QuizTokenizer;

/// Weight serialization of the base checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsFormat {
    SafeTensors,
    Pickle,
}

/// Tokenizer files shipped with the checkpoint
#[derive(Debug, Clone)]
pub enum TokenizerFiles {
    /// A bundled tokenizer.json
    Json(PathBuf),
    /// GPT-2 style vocab.json + merges.txt
    Bpe { vocab: PathBuf, merges: PathBuf },
}

/// Resolved on-disk locations of everything needed to build the model
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub config: PathBuf,
    pub weights: PathBuf,
    pub format: WeightsFormat,
    pub tokenizer: TokenizerFiles,
}

/// Locate checkpoint files, downloading from the hub unless a local
/// directory is configured.
pub fn resolve_files(config: &ModelConfig) -> Result<ResolvedModel> {
    match &config.model_dir {
        Some(dir) => resolve_local(dir),
        None => resolve_hub(&config.base_model),
    }
}

fn resolve_local(dir: &Path) -> Result<ResolvedModel> {
    if !dir.is_dir() {
        bail!("model directory {} does not exist", dir.display());
    }

    let config = dir.join("config.json");
    if !config.is_file() {
        bail!("{} has no config.json", dir.display());
    }

    let (weights, format) = if dir.join("model.safetensors").is_file() {
        (dir.join("model.safetensors"), WeightsFormat::SafeTensors)
    } else if dir.join("pytorch_model.bin").is_file() {
        (dir.join("pytorch_model.bin"), WeightsFormat::Pickle)
    } else {
        bail!(
            "{} has neither model.safetensors nor pytorch_model.bin",
            dir.display()
        );
    };

    let tokenizer = if dir.join("tokenizer.json").is_file() {
        TokenizerFiles::Json(dir.join("tokenizer.json"))
    } else if dir.join("vocab.json").is_file() && dir.join("merges.txt").is_file() {
        TokenizerFiles::Bpe {
            vocab: dir.join("vocab.json"),
            merges: dir.join("merges.txt"),
        }
    } else {
        bail!("{} has no tokenizer files", dir.display());
    };

    Ok(ResolvedModel {
        config,
        weights,
        format,
        tokenizer,
    })
}

fn resolve_hub(repo_id: &str) -> Result<ResolvedModel> {
    tracing::info!("fetching {} from the hub", repo_id);
    let api = Api::new()?;
    let repo = api.model(repo_id.to_string());

    let config = repo
        .get("config.json")
        .with_context(|| format!("downloading config.json from {repo_id}"))?;

    let (weights, format) = match repo.get("model.safetensors") {
        Ok(path) => (path, WeightsFormat::SafeTensors),
        Err(_) => (
            repo.get("pytorch_model.bin")
                .with_context(|| format!("downloading weights from {repo_id}"))?,
            WeightsFormat::Pickle,
        ),
    };

    let tokenizer = match repo.get("tokenizer.json") {
        Ok(path) => TokenizerFiles::Json(path),
        Err(_) => TokenizerFiles::Bpe {
            vocab: repo
                .get("vocab.json")
                .with_context(|| format!("downloading vocab.json from {repo_id}"))?,
            merges: repo
                .get("merges.txt")
                .with_context(|| format!("downloading merges.txt from {repo_id}"))?,
        },
    };

    Ok(ResolvedModel {
        config,
        weights,
        format,
        tokenizer,
    })
}

/// Read base weights into checkpoint-local names: the `transformer.` prefix
/// is stripped and the tied `lm_head` plus attention mask buffers dropped.
pub fn load_base_tensors(
    weights: &Path,
    format: WeightsFormat,
    device: &Device,
) -> Result<HashMap<String, Tensor>> {
    let raw: Vec<(String, Tensor)> = match format {
        WeightsFormat::SafeTensors => candle_core::safetensors::load(weights, device)?
            .into_iter()
            .collect(),
        WeightsFormat::Pickle => candle_core::pickle::read_all(weights)?,
    };

    let mut tensors = HashMap::new();
    for (name, tensor) in raw {
        let name = name.strip_prefix("transformer.").unwrap_or(&name).to_string();
        if name.starts_with("lm_head.") {
            continue;
        }
        // causal-mask buffers stored by some exporters, not parameters
        if name.ends_with(".attn.bias") || name.ends_with(".attn.masked_bias") {
            continue;
        }
        tensors.insert(name, tensor);
    }

    if tensors.is_empty() {
        bail!("no tensors found in {}", weights.display());
    }
    Ok(tensors)
}

/// Parse a dtype string ("f32", "f16", "bf16", long forms accepted)
pub fn parse_dtype(s: &str) -> Result<DType> {
    match s {
        "f32" | "float32" => Ok(DType::F32),
        "f16" | "float16" => Ok(DType::F16),
        "bf16" | "bfloat16" => Ok(DType::BF16),
        other => Err(anyhow!("unknown dtype: '{other}'")),
    }
}

/// Device selection from the configured device string
pub fn device(config: &ModelConfig) -> Result<Device> {
    match config.cuda_index() {
        Some(index) => Ok(Device::new_cuda(index)?),
        None => Ok(Device::Cpu),
    }
}

/// Load the adapted model and its tokenizer.
///
/// This is the once-per-process heavy path: checkpoint resolution, weight
/// reading, adapter merging and model construction.
pub fn load_model(
    config: &ModelConfig,
    device: &Device,
) -> Result<(Gpt2Model, Gpt2Config, QuizTokenizer)> {
    let resolved = resolve_files(config)?;

    let model_config: Gpt2Config = serde_json::from_str(
        &std::fs::read_to_string(&resolved.config)
            .with_context(|| format!("reading {}", resolved.config.display()))?,
    )
    .with_context(|| format!("parsing {}", resolved.config.display()))?;

    let mut tensors = load_base_tensors(&resolved.weights, resolved.format, device)?;

    if let Some(adapter_dir) = &config.adapter_dir {
        let merged = model::apply_adapter(&mut tensors, adapter_dir, device)?;
        tracing::info!(
            tensors = merged,
            "merged adapter from {}",
            adapter_dir.display()
        );
    }

    let dtype = parse_dtype(&config.dtype)?;
    let vb = VarBuilder::from_tensors(tensors, dtype, device);
    let model = Gpt2Model::new(&model_config, vb)?;

    let tokenizer = match &resolved.tokenizer {
        TokenizerFiles::Json(path) => QuizTokenizer::from_json_file(path)?,
        TokenizerFiles::Bpe { vocab, merges } => QuizTokenizer::from_bpe_files(vocab, merges)?,
    };

    Ok((model, model_config, tokenizer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dtype() {
        assert_eq!(parse_dtype("f32").unwrap(), DType::F32);
        assert_eq!(parse_dtype("float32").unwrap(), DType::F32);
        assert_eq!(parse_dtype("f16").unwrap(), DType::F16);
        assert_eq!(parse_dtype("bf16").unwrap(), DType::BF16);
        assert!(parse_dtype("int8").is_err());
        assert!(parse_dtype("").is_err());
    }

    #[test]
    fn test_missing_model_dir_fails_fast() {
        let config = ModelConfig {
            model_dir: Some(PathBuf::from("/nonexistent/quizgen-model")),
            ..Default::default()
        };
        let err = resolve_files(&config).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
