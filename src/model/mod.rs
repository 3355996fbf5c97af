//! Model layer
//!
//! A GPT-2 decoder built on candle, plus merging of a parameter-efficient
//! fine-tuned adapter into the base weights at load time.

mod gpt2;
mod lora;

pub use gpt2::{Gpt2Config, Gpt2Model, KvCache};
pub use lora::{apply_adapter, AdapterConfig};
