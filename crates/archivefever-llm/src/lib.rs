//! Archive Fever LLM - completion provider adapters

pub mod anthropic;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use provider::{LlmError, LlmProvider, LlmResult};
pub use types::*;
