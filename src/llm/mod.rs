//! LLM module - hosted model integrations
//!
//! Provides the provider abstraction, the OpenAI and Anthropic clients, and
//! the `ModelClient` handle shared by agents and collaborations.

pub mod anthropic;
pub mod client;
pub mod openai;
pub mod retry;
pub mod sse;
pub mod traits;

use std::sync::Arc;

use crate::core::{Config, ProviderKind, Result};

pub use anthropic::AnthropicProvider;
pub use client::ModelClient;
pub use openai::OpenAIProvider;
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TextStream, TokenUsage, ToolChoice};

/// Create a new LLM provider based on configuration
pub fn create_provider(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match config.provider.kind {
        ProviderKind::OpenAI => Arc::new(OpenAIProvider::from_config(config)?),
        ProviderKind::Claude => Arc::new(AnthropicProvider::from_config(config)?),
    };
    Ok(provider)
}
