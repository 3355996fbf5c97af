//! LoRA adapter merging
//!
//! The fine-tuned adapter ships as a PEFT directory: `adapter_config.json`
//! plus `adapter_model.safetensors` holding `lora_A` / `lora_B` pairs named
//! after the base tensors they target. Deltas are folded into the base
//! weights before the model is built, so the served model is a single set
//! of merged tensors: `W' = W + (alpha/r) * B @ A` (transposed for Conv1D
//! layouts).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use candle_core::{DType, Device, Tensor};
use serde::Deserialize;

/// Subset of PEFT's adapter_config.json that matters for merging
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    pub r: usize,
    pub lora_alpha: f64,
    /// True for Conv1D targets (GPT-2), where the base weight is (in, out)
    #[serde(default)]
    pub fan_in_fan_out: bool,
}

impl AdapterConfig {
    pub fn scaling(&self) -> f64 {
        self.lora_alpha / self.r as f64
    }
}

/// Merge every adapter pair into `tensors`, returning how many base tensors
/// were updated. Tensor names in `tensors` are expected in checkpoint-local
/// form (no `transformer.` prefix).
pub fn apply_adapter(
    tensors: &mut HashMap<String, Tensor>,
    adapter_dir: &Path,
    device: &Device,
) -> Result<usize> {
    let config_path = adapter_dir.join("adapter_config.json");
    let config: AdapterConfig = serde_json::from_str(
        &std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?,
    )
    .with_context(|| format!("parsing {}", config_path.display()))?;

    let weights_path = adapter_dir.join("adapter_model.safetensors");
    let adapter = candle_core::safetensors::load(&weights_path, device)
        .with_context(|| format!("reading {}", weights_path.display()))?;

    let scaling = config.scaling();
    let mut merged = 0usize;

    for (name, lora_a) in adapter.iter() {
        let Some(prefix) = name.strip_suffix("lora_A.weight") else {
            continue;
        };
        let b_name = format!("{prefix}lora_B.weight");
        let lora_b = adapter
            .get(&b_name)
            .ok_or_else(|| anyhow!("adapter tensor {b_name} missing"))?;

        let target = base_key(prefix);
        let base = tensors
            .get(&target)
            .ok_or_else(|| anyhow!("adapter targets unknown base tensor {target}"))?;

        // delta = (alpha/r) * B @ A, shape (out, in)
        let delta = (lora_b
            .to_dtype(DType::F32)?
            .matmul(&lora_a.to_dtype(DType::F32)?)?
            * scaling)?;
        let delta = if config.fan_in_fan_out {
            delta.t()?.contiguous()?
        } else {
            delta
        };
        // mis-declared layouts still merge when the transpose lines up
        let delta = if delta.dims() == base.dims() {
            delta
        } else {
            delta.t()?.contiguous()?
        };
        if delta.dims() != base.dims() {
            bail!(
                "adapter delta for {target} has shape {:?}, base is {:?}",
                delta.dims(),
                base.dims()
            );
        }

        let updated = (base.to_dtype(DType::F32)? + &delta)?.to_dtype(base.dtype())?;
        tensors.insert(target, updated);
        merged += 1;
    }

    if merged == 0 {
        bail!(
            "adapter at {} contains no lora_A/lora_B pairs",
            adapter_dir.display()
        );
    }
    Ok(merged)
}

/// Map a PEFT tensor prefix to the checkpoint-local base tensor name:
/// `base_model.model.transformer.h.0.attn.c_attn.` -> `h.0.attn.c_attn.weight`
fn base_key(prefix: &str) -> String {
    let trimmed = prefix
        .trim_start_matches("base_model.model.")
        .trim_start_matches("transformer.");
    format!("{trimmed}weight")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_adapter(dir: &Path, fan_in_fan_out: bool) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join("adapter_config.json"),
            format!(r#"{{"r": 1, "lora_alpha": 2, "fan_in_fan_out": {fan_in_fan_out}}}"#),
        )
        .unwrap();

        let device = Device::Cpu;
        let lora_a = Tensor::from_slice(&[1f32, 2.0, 3.0], (1, 3), &device).unwrap();
        let lora_b = Tensor::from_slice(&[1f32, 10.0], (2, 1), &device).unwrap();
        let mut adapter = HashMap::new();
        adapter.insert(
            "base_model.model.transformer.h.0.attn.c_attn.lora_A.weight".to_string(),
            lora_a,
        );
        adapter.insert(
            "base_model.model.transformer.h.0.attn.c_attn.lora_B.weight".to_string(),
            lora_b,
        );
        candle_core::safetensors::save(&adapter, dir.join("adapter_model.safetensors")).unwrap();
    }

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("quizgen-lora-{tag}-{}", std::process::id()))
    }

    #[test]
    fn test_merge_linear_layout() {
        let dir = temp_dir("linear");
        write_adapter(&dir, false);

        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        tensors.insert(
            "h.0.attn.c_attn.weight".to_string(),
            Tensor::zeros((2, 3), DType::F32, &device).unwrap(),
        );

        let merged = apply_adapter(&mut tensors, &dir, &device).unwrap();
        assert_eq!(merged, 1);

        // (alpha/r) = 2, B @ A = [[1,2,3],[10,20,30]]
        let updated: Vec<Vec<f32>> = tensors["h.0.attn.c_attn.weight"].to_vec2().unwrap();
        assert_eq!(updated, vec![vec![2.0, 4.0, 6.0], vec![20.0, 40.0, 60.0]]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_merge_conv1d_layout_transposes() {
        let dir = temp_dir("conv1d");
        write_adapter(&dir, true);

        let device = Device::Cpu;
        let mut tensors = HashMap::new();
        // Conv1D weight is (in, out) = (3, 2)
        tensors.insert(
            "h.0.attn.c_attn.weight".to_string(),
            Tensor::ones((3, 2), DType::F32, &device).unwrap(),
        );

        apply_adapter(&mut tensors, &dir, &device).unwrap();

        let updated: Vec<Vec<f32>> = tensors["h.0.attn.c_attn.weight"].to_vec2().unwrap();
        assert_eq!(
            updated,
            vec![vec![3.0, 21.0], vec![5.0, 41.0], vec![7.0, 61.0]]
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_target_is_an_error() {
        let dir = temp_dir("unknown");
        write_adapter(&dir, false);

        let mut tensors = HashMap::new();
        let err = apply_adapter(&mut tensors, &dir, &Device::Cpu).unwrap_err();
        assert!(err.to_string().contains("unknown base tensor"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
