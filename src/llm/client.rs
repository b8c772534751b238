//! Shared handle to one configured model endpoint
//!
//! Every agent and collaboration holds a clone of the same `ModelClient`
//! instead of reaching for global state, so several independently configured
//! endpoints can live in one process.

use std::sync::Arc;

use crate::core::{Config, Message, Result, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TextStream, ToolChoice};

/// Provider plus the configuration that resolves its defaults
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn LLMProvider>,
    config: Arc<Config>,
}

impl ModelClient {
    /// Wrap an existing provider
    pub fn new(provider: Arc<dyn LLMProvider>, config: Config) -> Self {
        Self {
            provider,
            config: Arc::new(config),
        }
    }

    /// Build the provider named by the configuration
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let provider = crate::llm::create_provider(&config)?;
        Ok(Self::new(provider, config))
    }

    /// Fail with a configuration error unless the endpoint can accept calls
    pub fn ensure_ready(&self) -> Result<()> {
        if self.provider.is_ready() {
            Ok(())
        } else {
            Err(self.config.not_ready_error())
        }
    }

    /// Send messages (and optionally tools) to the endpoint.
    ///
    /// `model` and `temperature` fall back to the configured defaults.
    pub async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<LLMResponse> {
        let options = self.options(temperature, ToolChoice::Auto);
        self.dispatch(messages, tools, model, options).await
    }

    /// Send a conversation that already carries tool calls and results.
    ///
    /// The definitions go along with the request but the model may not call
    /// them again, so the reply is text.
    pub async fn send_tool_results(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<LLMResponse> {
        let options = self.options(temperature, ToolChoice::None);
        self.dispatch(messages, tools, model, options).await
    }

    /// Stream a plain reply as text chunks
    pub async fn stream(
        &self,
        messages: &[Message],
        model: Option<&str>,
        temperature: Option<f32>,
    ) -> Result<TextStream> {
        let model = model.unwrap_or(&self.config.model.name);
        let options = self.options(temperature, ToolChoice::Auto);

        tracing::debug!(
            provider = self.provider.name(),
            model,
            messages = messages.len(),
            "Starting streamed chat request"
        );
        self.provider
            .chat_stream(model, messages, Some(options))
            .await
    }

    fn options(&self, temperature: Option<f32>, tool_choice: ToolChoice) -> GenerateOptions {
        GenerateOptions {
            temperature: Some(temperature.unwrap_or(self.config.model.temperature)),
            max_tokens: self.config.model.max_tokens,
            tool_choice,
        }
    }

    async fn dispatch(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        model: Option<&str>,
        options: GenerateOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(&self.config.model.name);

        tracing::debug!(
            provider = self.provider.name(),
            model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat request"
        );

        if tools.is_empty() {
            self.provider.chat(model, messages, Some(options)).await
        } else {
            self.provider
                .chat_with_tools(model, messages, tools, Some(options))
                .await
        }
    }

    /// Get current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("provider", &self.provider_name())
            .field("model", &self.config.model.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingProvider {
        ready: bool,
        seen: Mutex<Vec<(String, Option<f32>, usize, ToolChoice)>>,
    }

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        async fn chat_with_tools(
            &self,
            model: &str,
            _messages: &[Message],
            tools: &[ToolDefinition],
            options: Option<GenerateOptions>,
        ) -> Result<LLMResponse> {
            let options = options.unwrap_or_default();
            self.seen.lock().unwrap().push((
                model.to_string(),
                options.temperature,
                tools.len(),
                options.tool_choice,
            ));
            Ok(LLMResponse::text("ok"))
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn test_send_resolves_defaults() {
        let provider = Arc::new(RecordingProvider {
            ready: true,
            seen: Mutex::new(Vec::new()),
        });
        let client = ModelClient::new(provider.clone(), Config::default());

        tokio_test::block_on(async {
            client
                .send(&[Message::user("hi")], &[], None, None)
                .await
                .unwrap();
            client
                .send(&[Message::user("hi")], &[], Some("gpt-4o-mini"), Some(0.3))
                .await
                .unwrap();
        });

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0], ("gpt-4o".to_string(), Some(0.7), 0, ToolChoice::Auto));
        assert_eq!(
            seen[1],
            ("gpt-4o-mini".to_string(), Some(0.3), 0, ToolChoice::Auto)
        );
    }

    #[test]
    fn test_tool_results_disable_further_calls() {
        let provider = Arc::new(RecordingProvider {
            ready: true,
            seen: Mutex::new(Vec::new()),
        });
        let client = ModelClient::new(provider.clone(), Config::default());
        let tools = [ToolDefinition::function("add", "Add", serde_json::json!({}))];

        tokio_test::block_on(async {
            client
                .send_tool_results(&[Message::user("hi")], &tools, None, None)
                .await
                .unwrap();
        });

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].2, 1);
        assert_eq!(seen[0].3, ToolChoice::None);
    }

    #[test]
    fn test_default_stream_yields_whole_reply() {
        use futures::StreamExt;

        let provider = Arc::new(RecordingProvider {
            ready: true,
            seen: Mutex::new(Vec::new()),
        });
        let client = ModelClient::new(provider, Config::default());
        assert_eq!(client.provider_name(), "recording");

        let chunks: Vec<String> = tokio_test::block_on(async {
            let stream = client.stream(&[Message::user("hi")], None, None).await.unwrap();
            stream.map(|chunk| chunk.unwrap()).collect().await
        });
        assert_eq!(chunks, vec!["ok".to_string()]);
    }

    #[test]
    fn test_ensure_ready() {
        let provider = Arc::new(RecordingProvider {
            ready: false,
            seen: Mutex::new(Vec::new()),
        });
        let client = ModelClient::new(provider, Config::default());
        let err = client.ensure_ready().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
