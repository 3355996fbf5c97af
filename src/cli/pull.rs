//! Prefetch the base checkpoint from the HuggingFace Hub

use std::path::PathBuf;

use anyhow::Result;
use hf_hub::api::sync::Api;

use crate::config::QuizgenConfig;

/// Files a GPT-2 style checkpoint may ship; missing ones are skipped
const CHECKPOINT_FILES: &[&str] = &[
    "config.json",
    "model.safetensors",
    "pytorch_model.bin",
    "tokenizer.json",
    "vocab.json",
    "merges.txt",
    "special_tokens_map.json",
];

/// Download the base checkpoint into a local directory so `serve` can run
/// with `model.model_dir` pointing at it (air-gapped deployments).
pub async fn pull(
    config: QuizgenConfig,
    repo: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let repo_id = repo.unwrap_or(config.model.base_model);
    let output_dir = output.unwrap_or_else(|| {
        let name = repo_id.split('/').next_back().unwrap_or(&repo_id);
        PathBuf::from("./models").join(name)
    });
    std::fs::create_dir_all(&output_dir)?;

    println!("Downloading from: {}", repo_id);
    println!("Downloading to: {}", output_dir.display());

    let api = Api::new()?;
    let repo_api = api.model(repo_id.clone());

    let mut downloaded = 0usize;
    for filename in CHECKPOINT_FILES {
        match repo_api.get(filename) {
            Ok(cached_path) => {
                let dest = output_dir.join(filename);
                std::fs::copy(&cached_path, &dest)?;
                println!("  Downloaded: {}", filename);
                downloaded += 1;
            }
            Err(_) => {
                // file not in the repo, skip
            }
        }
    }

    if downloaded == 0 {
        anyhow::bail!("no checkpoint files found in {}", repo_id);
    }

    println!("\nCheckpoint ready at: {}", output_dir.display());
    Ok(())
}
