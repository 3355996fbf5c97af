//! Tokenizer wrapper for the base checkpoint
//!
//! Loads either a bundled `tokenizer.json` or, for older GPT-2-style
//! checkpoints, builds a byte-level BPE tokenizer from `vocab.json` +
//! `merges.txt`.

use std::path::Path;

use anyhow::{anyhow, Result};
use tokenizers::models::bpe::BPE;
use tokenizers::pre_tokenizers::byte_level::ByteLevel;

/// Special tokens probed for the end-of-sequence id, in priority order
const EOS_CANDIDATES: &[&str] = &["</s>", "<|endoftext|>", "<eos>", "[EOS]"];

/// Wrapper over a HuggingFace tokenizer
pub struct QuizTokenizer {
    inner: tokenizers::Tokenizer,
    eos_token_id: Option<u32>,
}

impl QuizTokenizer {
    /// Load from a `tokenizer.json` file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path.as_ref())
            .map_err(|e| anyhow!("failed to load tokenizer.json: {e}"))?;
        Ok(Self::wrap(inner))
    }

    /// Build a GPT-2 byte-level BPE tokenizer from `vocab.json` + `merges.txt`
    pub fn from_bpe_files<P: AsRef<Path>>(vocab: P, merges: P) -> Result<Self> {
        let vocab = vocab.as_ref().to_string_lossy().into_owned();
        let merges = merges.as_ref().to_string_lossy().into_owned();
        let bpe = BPE::from_file(&vocab, &merges)
            .build()
            .map_err(|e| anyhow!("failed to build BPE tokenizer: {e}"))?;

        let mut inner = tokenizers::Tokenizer::new(bpe);
        inner.with_pre_tokenizer(Some(ByteLevel::new(false, true, true)));
        inner.with_decoder(Some(ByteLevel::new(false, true, true)));
        Ok(Self::wrap(inner))
    }

    fn wrap(inner: tokenizers::Tokenizer) -> Self {
        let eos_token_id = EOS_CANDIDATES
            .iter()
            .find_map(|token| inner.token_to_id(token));
        Self {
            inner,
            eos_token_id,
        }
    }

    /// Encode text to token IDs, truncating to `max_tokens`
    pub fn encode(&self, text: &str, max_tokens: usize) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow!("tokenization failed: {e}"))?;
        let mut ids = encoding.get_ids().to_vec();
        ids.truncate(max_tokens);
        Ok(ids)
    }

    /// Decode token IDs to text, stripping special tokens
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| anyhow!("decode failed: {e}"))
    }

    /// Check if a token is the EOS token
    pub fn is_eos(&self, token_id: u32) -> bool {
        self.eos_token_id == Some(token_id)
    }

    /// Get the EOS token ID, if the vocabulary has one
    pub fn eos_token_id(&self) -> Option<u32> {
        self.eos_token_id
    }

    /// Get vocabulary size (including added tokens)
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}
