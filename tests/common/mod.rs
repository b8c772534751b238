//! Shared helpers for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use troupe::core::{Message, ToolDefinition};
use troupe::llm::GenerateOptions;
use troupe::{Config, LLMProvider, LLMResponse, ModelClient, Result};

/// What a scripted provider was asked
#[derive(Debug, Clone)]
pub struct Seen {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
}

impl Seen {
    pub fn system(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    pub fn user(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    pub fn is_planning(&self) -> bool {
        self.user().contains("Available Agents:")
    }
}

type Script = Box<dyn Fn(&Seen) -> Result<LLMResponse> + Send + Sync>;

/// Provider answering from a closure and recording every request
pub struct Scripted {
    script: Script,
    seen: Mutex<Vec<Seen>>,
}

impl Scripted {
    pub fn new(script: impl Fn(&Seen) -> Result<LLMResponse> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for Scripted {
    async fn chat_with_tools(
        &self,
        _model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let seen = Seen {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            temperature: options.and_then(|o| o.temperature),
        };
        let reply = (self.script)(&seen);
        self.seen.lock().unwrap().push(seen);
        reply
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn client(provider: Arc<Scripted>) -> ModelClient {
    ModelClient::new(provider, Config::default())
}

/// Config pointing at a mock server, without retries
pub fn http_config(kind: troupe::ProviderKind, base_url: &str) -> Config {
    let mut config = Config::for_provider(kind);
    config.provider.api_key = Some("test-key".to_string());
    config.provider.base_url = Some(base_url.to_string());
    config.provider.max_retries = 0;
    config.provider.retry_base_delay_ms = 0;
    config
}
