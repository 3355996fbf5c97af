//! GPT-2 decoder
//!
//! The base checkpoint family (rugpt3small and friends) is plain GPT-2:
//! token + position embeddings, pre-LN blocks with fused-QKV attention,
//! GELU MLP, final LayerNorm and a tied output head. Checkpoint weights use
//! Conv1D layout, so linear weights are stored as (in, out).

use candle_core::{DType, IndexOp, Result, Tensor, D};
use candle_nn::{embedding, layer_norm, Embedding, LayerNorm, Module, VarBuilder};
use serde::Deserialize;

/// Architecture hyperparameters, deserialized from the checkpoint's
/// config.json. Defaults are the GPT-2 small values.
#[derive(Debug, Clone, Deserialize)]
pub struct Gpt2Config {
    #[serde(default = "default_vocab_size")]
    pub vocab_size: usize,
    #[serde(default = "default_n_positions")]
    pub n_positions: usize,
    #[serde(default = "default_n_embd")]
    pub n_embd: usize,
    #[serde(default = "default_n_layer")]
    pub n_layer: usize,
    #[serde(default = "default_n_head")]
    pub n_head: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
    #[serde(default)]
    pub eos_token_id: Option<u32>,
}

fn default_vocab_size() -> usize {
    50257
}

fn default_n_positions() -> usize {
    1024
}

fn default_n_embd() -> usize {
    768
}

fn default_n_layer() -> usize {
    12
}

fn default_n_head() -> usize {
    12
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

impl Default for Gpt2Config {
    fn default() -> Self {
        Self {
            vocab_size: default_vocab_size(),
            n_positions: default_n_positions(),
            n_embd: default_n_embd(),
            n_layer: default_n_layer(),
            n_head: default_n_head(),
            layer_norm_epsilon: default_layer_norm_epsilon(),
            eos_token_id: None,
        }
    }
}

impl Gpt2Config {
    pub fn head_dim(&self) -> usize {
        self.n_embd / self.n_head
    }
}

/// Per-layer key/value cache for incremental decoding
pub type KvCache = Vec<Option<(Tensor, Tensor)>>;

/// GPT-2 Conv1D: a linear layer with (in, out) weight layout
struct Conv1D {
    weight: Tensor,
    bias: Tensor,
}

impl Conv1D {
    fn load(n_in: usize, n_out: usize, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get((n_in, n_out), "weight")?;
        let bias = vb.get(n_out, "bias")?;
        Ok(Self { weight, bias })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        x.broadcast_matmul(&self.weight)?.broadcast_add(&self.bias)
    }
}

struct Attention {
    c_attn: Conv1D,
    c_proj: Conv1D,
    n_head: usize,
    head_dim: usize,
}

impl Attention {
    fn load(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let n = config.n_embd;
        Ok(Self {
            c_attn: Conv1D::load(n, 3 * n, vb.pp("c_attn"))?,
            c_proj: Conv1D::load(n, n, vb.pp("c_proj"))?,
            n_head: config.n_head,
            head_dim: config.head_dim(),
        })
    }

    fn split_heads(&self, x: &Tensor, b: usize, t: usize) -> Result<Tensor> {
        x.reshape((b, t, self.n_head, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }

    fn forward(
        &self,
        x: &Tensor,
        mask: Option<&Tensor>,
        cache: &mut Option<(Tensor, Tensor)>,
    ) -> Result<Tensor> {
        let (b, t, n) = x.dims3()?;
        let qkv = self.c_attn.forward(x)?;
        let q = self.split_heads(&qkv.narrow(D::Minus1, 0, n)?, b, t)?;
        let k = self.split_heads(&qkv.narrow(D::Minus1, n, n)?, b, t)?;
        let v = self.split_heads(&qkv.narrow(D::Minus1, 2 * n, n)?, b, t)?;

        let (k, v) = match cache.take() {
            Some((past_k, past_v)) => (
                Tensor::cat(&[&past_k, &k], 2)?,
                Tensor::cat(&[&past_v, &v], 2)?,
            ),
            None => (k, v),
        };
        *cache = Some((k.clone(), v.clone()));

        let att = (q.matmul(&k.transpose(2, 3)?.contiguous()?)? / (self.head_dim as f64).sqrt())?;
        let att = match mask {
            Some(mask) => att.broadcast_add(mask)?,
            None => att,
        };
        let att = candle_nn::ops::softmax_last_dim(&att)?;

        let y = att.matmul(&v.contiguous()?)?;
        let y = y.transpose(1, 2)?.reshape((b, t, n))?;
        self.c_proj.forward(&y)
    }
}

struct Mlp {
    c_fc: Conv1D,
    c_proj: Conv1D,
}

impl Mlp {
    fn load(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let n = config.n_embd;
        Ok(Self {
            c_fc: Conv1D::load(n, 4 * n, vb.pp("c_fc"))?,
            c_proj: Conv1D::load(4 * n, n, vb.pp("c_proj"))?,
        })
    }

    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.c_proj.forward(&self.c_fc.forward(x)?.gelu()?)
    }
}

struct Block {
    ln_1: LayerNorm,
    attn: Attention,
    ln_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    fn load(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            ln_1: layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_1"))?,
            attn: Attention::load(config, vb.pp("attn"))?,
            ln_2: layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_2"))?,
            mlp: Mlp::load(config, vb.pp("mlp"))?,
        })
    }

    fn forward(
        &self,
        x: &Tensor,
        mask: Option<&Tensor>,
        cache: &mut Option<(Tensor, Tensor)>,
    ) -> Result<Tensor> {
        let x = (x + self.attn.forward(&self.ln_1.forward(x)?, mask, cache)?)?;
        &x + self.mlp.forward(&self.ln_2.forward(&x)?)?
    }
}

/// GPT-2 language model with a tied output head
pub struct Gpt2Model {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    lm_head: Tensor,
    config: Gpt2Config,
}

impl Gpt2Model {
    pub fn new(config: &Gpt2Config, vb: VarBuilder) -> Result<Self> {
        let wte = embedding(config.vocab_size, config.n_embd, vb.pp("wte"))?;
        let wpe = embedding(config.n_positions, config.n_embd, vb.pp("wpe"))?;
        let blocks = (0..config.n_layer)
            .map(|i| Block::load(config, vb.pp(format!("h.{i}"))))
            .collect::<Result<Vec<_>>>()?;
        let ln_f = layer_norm(config.n_embd, config.layer_norm_epsilon, vb.pp("ln_f"))?;
        let lm_head = wte.embeddings().t()?.contiguous()?;
        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            lm_head,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &Gpt2Config {
        &self.config
    }

    /// Fresh per-request cache
    pub fn empty_cache(&self) -> KvCache {
        vec![None; self.blocks.len()]
    }

    /// Forward pass over `input_ids` of shape (batch, seq).
    ///
    /// `past_len` is the number of tokens already held in `cache`; positions
    /// continue from there. Returns logits of shape (batch, seq, vocab).
    pub fn forward(&self, input_ids: &Tensor, past_len: usize, cache: &mut KvCache) -> Result<Tensor> {
        let (_b, t) = input_ids.dims2()?;
        let device = input_ids.device();

        let tok_emb = self.wte.forward(input_ids)?;
        let positions = Tensor::arange(past_len as u32, (past_len + t) as u32, device)?;
        let pos_emb = self.wpe.forward(&positions)?;
        let mut x = tok_emb.broadcast_add(&pos_emb)?;

        let mask = if t > 1 {
            Some(causal_mask(t, past_len, device)?.to_dtype(x.dtype())?)
        } else {
            None
        };

        for (block, layer_cache) in self.blocks.iter().zip(cache.iter_mut()) {
            x = block.forward(&x, mask.as_ref(), layer_cache)?;
        }

        let x = self.ln_f.forward(&x)?;
        x.broadcast_matmul(&self.lm_head)
    }

    /// Logits for the last position only, shape (vocab)
    pub fn forward_last(
        &self,
        input_ids: &Tensor,
        past_len: usize,
        cache: &mut KvCache,
    ) -> Result<Tensor> {
        let logits = self.forward(input_ids, past_len, cache)?;
        let t = logits.dim(1)?;
        logits.i((0, t - 1))?.to_dtype(DType::F32)
    }
}

/// Additive causal mask of shape (t, past + t): 0 where attention is
/// allowed, -inf above the diagonal.
fn causal_mask(t: usize, past_len: usize, device: &candle_core::Device) -> Result<Tensor> {
    let total = past_len + t;
    let mask: Vec<f32> = (0..t)
        .flat_map(|i| {
            (0..total).map(move |j| {
                if j <= i + past_len {
                    0.0
                } else {
                    f32::NEG_INFINITY
                }
            })
        })
        .collect();
    Tensor::from_slice(&mask, (t, total), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::VarMap;

    fn tiny_config() -> Gpt2Config {
        Gpt2Config {
            vocab_size: 16,
            n_positions: 32,
            n_embd: 8,
            n_layer: 2,
            n_head: 2,
            layer_norm_epsilon: 1e-5,
            eos_token_id: Some(0),
        }
    }

    fn tiny_model() -> Gpt2Model {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        Gpt2Model::new(&tiny_config(), vb).unwrap()
    }

    #[test]
    fn test_forward_shapes() {
        let model = tiny_model();
        let mut cache = model.empty_cache();

        let input = Tensor::new(&[1u32, 2, 3, 4], &Device::Cpu)
            .unwrap()
            .unsqueeze(0)
            .unwrap();
        let logits = model.forward(&input, 0, &mut cache).unwrap();
        assert_eq!(logits.dims(), &[1, 4, 16]);
    }

    #[test]
    fn test_incremental_decode_with_cache() {
        let model = tiny_model();
        let mut cache = model.empty_cache();

        let prompt = Tensor::new(&[1u32, 2, 3], &Device::Cpu)
            .unwrap()
            .unsqueeze(0)
            .unwrap();
        let logits = model.forward_last(&prompt, 0, &mut cache).unwrap();
        assert_eq!(logits.dims(), &[16]);

        // one more token, positions continue past the cached prefix
        let next = Tensor::new(&[4u32], &Device::Cpu)
            .unwrap()
            .unsqueeze(0)
            .unwrap();
        let logits = model.forward_last(&next, 3, &mut cache).unwrap();
        assert_eq!(logits.dims(), &[16]);

        // cache holds all four positions in every layer
        for layer_cache in &cache {
            let (k, _v) = layer_cache.as_ref().unwrap();
            assert_eq!(k.dim(2).unwrap(), 4);
        }
    }

    #[test]
    fn test_logits_are_finite() {
        let model = tiny_model();
        let mut cache = model.empty_cache();

        let input = Tensor::new(&[5u32, 6], &Device::Cpu)
            .unwrap()
            .unsqueeze(0)
            .unwrap();
        let logits = model.forward_last(&input, 0, &mut cache).unwrap();
        let values: Vec<f32> = logits.to_vec1().unwrap();
        assert!(values.iter().all(|v| v.is_finite()));
    }
}
