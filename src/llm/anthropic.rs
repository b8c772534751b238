//! Anthropic messages client
//!
//! Translates the crate's OpenAI-shaped conversation into `/messages`
//! requests: system text moves to the top-level `system` field, tool calls
//! become `tool_use` blocks and tool results are grouped into one user turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::core::{Config, Message, Result, ToolCall, ToolDefinition, TroupeError};
use crate::llm::retry::RetryPolicy;
use crate::llm::sse::{self, SseEvent};
use crate::llm::traits::{
    GenerateOptions, LLMProvider, LLMResponse, TextStream, TokenUsage, ToolChoice,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic API client
#[derive(Clone)]
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicProvider {
    /// Create a client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.provider.timeout_secs))
            .build()
            .map_err(|e| TroupeError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            api_key: config.provider.api_key.clone(),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Split the conversation into the `system` text and the message list
    fn to_anthropic_messages(messages: &[Message]) -> (String, Vec<Value>) {
        let mut system = Vec::new();
        let mut converted: Vec<Value> = Vec::new();
        let mut pending_results: Vec<Value> = Vec::new();

        for msg in messages {
            if msg.is_tool_result() {
                pending_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": msg.tool_call_id.clone().unwrap_or_default(),
                    "content": msg.content,
                }));
                continue;
            }

            if !pending_results.is_empty() {
                converted.push(json!({
                    "role": "user",
                    "content": std::mem::take(&mut pending_results),
                }));
            }

            if msg.is_system() {
                system.push(msg.content.clone());
                continue;
            }

            match msg.tool_calls {
                Some(ref calls) if !calls.is_empty() => {
                    let mut blocks = Vec::new();
                    if !msg.content.is_empty() {
                        blocks.push(json!({"type": "text", "text": msg.content}));
                    }
                    for call in calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments_object().unwrap_or_default(),
                        }));
                    }
                    converted.push(json!({"role": "assistant", "content": blocks}));
                }
                _ => {
                    let role = if msg.role == "assistant" {
                        "assistant"
                    } else {
                        "user"
                    };
                    converted.push(json!({"role": role, "content": msg.content}));
                }
            }
        }

        if !pending_results.is_empty() {
            converted.push(json!({"role": "user", "content": pending_results}));
        }

        (system.join("\n"), converted)
    }

    /// Convert tool definitions to Anthropic's shape
    fn to_anthropic_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.function.name,
                    "description": t.function.description,
                    "input_schema": t.function.parameters,
                })
            })
            .collect()
    }

    /// Request body for `/messages`
    fn build_payload(
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: GenerateOptions,
        stream: bool,
    ) -> Value {
        let (system, api_messages) = Self::to_anthropic_messages(messages);

        let mut payload = json!({
            "model": model,
            "messages": api_messages,
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });
        if let Some(temperature) = options.temperature {
            payload["temperature"] = json!(temperature);
        }
        if !system.is_empty() {
            payload["system"] = json!(system);
        }
        if !tools.is_empty() {
            payload["tools"] = json!(Self::to_anthropic_tools(tools));
            if options.tool_choice == ToolChoice::None {
                payload["tool_choice"] = json!({"type": "none"});
            }
        }
        if stream {
            payload["stream"] = json!(true);
        }
        payload
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| TroupeError::config("Anthropic API key is not set"))?;

        let url = format!("{}/messages", self.base_url);
        self.retry
            .send("Anthropic", || {
                self.client
                    .post(&url)
                    .header("x-api-key", api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .json(payload)
            })
            .await
    }

    /// Text delta of one streaming event
    fn stream_event(payload: &str) -> Result<SseEvent> {
        let value: Value = serde_json::from_str(payload)
            .map_err(|e| TroupeError::api(format!("Bad Anthropic stream event: {}", e)))?;

        match value["type"].as_str() {
            Some("content_block_delta") => match value["delta"]["text"].as_str() {
                Some(text) if value["delta"]["type"] == "text_delta" => {
                    Ok(SseEvent::Text(text.to_string()))
                }
                _ => Ok(SseEvent::Skip),
            },
            Some("message_stop") => Ok(SseEvent::Done),
            Some("error") => Err(TroupeError::api(format!(
                "Anthropic stream error: {}",
                value["error"]
            ))),
            _ => Ok(SseEvent::Skip),
        }
    }

    fn to_llm_response(response: MessagesResponse) -> LLMResponse {
        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in response.content {
            match block {
                ContentBlock::Text { text } => text_parts.push(text),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id, name, input))
                }
                ContentBlock::Unsupported => {}
            }
        }

        LLMResponse {
            content: text_parts.join(" "),
            tool_calls,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            }),
            model: response.model,
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let payload =
            Self::build_payload(model, messages, tools, options.unwrap_or_default(), false);
        let response = self.post(&payload).await?;

        let response_text = response.text().await?;
        let parsed: MessagesResponse = serde_json::from_str(&response_text).map_err(|e| {
            TroupeError::api(format!("Failed to parse Anthropic response: {}", e))
        })?;

        Ok(Self::to_llm_response(parsed))
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<TextStream> {
        let payload = Self::build_payload(model, messages, &[], options.unwrap_or_default(), true);
        let response = self.post(&payload).await?;
        Ok(sse::text_stream(response, "Anthropic", Self::stream_event))
    }

    fn is_ready(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
