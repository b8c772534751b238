//! OpenAI chat-completions client
//!
//! Async HTTP client for `/chat/completions` with function-style tool calling.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::{Config, Message, Result, ToolCall, ToolDefinition, TroupeError};
use crate::llm::retry::RetryPolicy;
use crate::llm::sse::{self, SseEvent};
use crate::llm::traits::{
    GenerateOptions, LLMProvider, LLMResponse, TextStream, TokenUsage, ToolChoice,
};

/// OpenAI API client
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

/// OpenAI message format
#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

/// OpenAI tool call format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: OpenAIFunction,
}

/// Function in a tool call; arguments travel as encoded JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAIProvider {
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

    /// Convert internal Message to OpenAI format
    fn to_openai_message(msg: &Message) -> OpenAIMessage {
        let tool_calls = msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|tc| OpenAIToolCall {
                    id: tc.id.clone(),
                    call_type: function_type(),
                    function: OpenAIFunction {
                        name: tc.name.clone(),
                        arguments: tc.arguments_text(),
                    },
                })
                .collect::<Vec<_>>()
        });

        // Assistant turns that only carry tool calls send a null content
        let content = if tool_calls.is_some() && msg.content.is_empty() {
            None
        } else {
            Some(msg.content.clone())
        };

        OpenAIMessage {
            role: msg.role.clone(),
            content,
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| TroupeError::config("OpenAI API key is not set"))
    }

    fn build_request<'a>(
        model: &'a str,
        messages: &[Message],
        tools: &'a [ToolDefinition],
        options: GenerateOptions,
        stream: bool,
    ) -> ChatRequest<'a> {
        let (tools, tool_choice) = if tools.is_empty() {
            (None, None)
        } else {
            let choice = match options.tool_choice {
                ToolChoice::Auto => None,
                ToolChoice::None => Some("none"),
            };
            (Some(tools), choice)
        };

        ChatRequest {
            model,
            messages: messages.iter().map(Self::to_openai_message).collect(),
            tools,
            tool_choice,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream,
        }
    }

    async fn post(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.base_url);
        self.retry
            .send("OpenAI", || {
                self.client.post(&url).bearer_auth(api_key).json(request)
            })
            .await
    }

    /// Text delta of one `chat.completion.chunk` payload
    fn stream_event(payload: &str) -> Result<SseEvent> {
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| TroupeError::api(format!("Bad OpenAI stream chunk: {}", e)))?;

        if let Some(error) = value.get("error") {
            return Err(TroupeError::api(format!("OpenAI stream error: {}", error)));
        }

        match value["choices"][0]["delta"]["content"].as_str() {
            Some(text) if !text.is_empty() => Ok(SseEvent::Text(text.to_string())),
            _ => Ok(SseEvent::Skip),
        }
    }

    /// Convert an OpenAI response to LLMResponse
    fn to_llm_response(response: ChatResponse) -> Result<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TroupeError::api("OpenAI response contained no choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| {
                ToolCall::new(
                    tc.id,
                    tc.function.name,
                    serde_json::Value::String(tc.function.arguments),
                )
            })
            .collect();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: response.model,
        })
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request =
            Self::build_request(model, messages, tools, options.unwrap_or_default(), false);
        let response = self.post(&request).await?;

        let response_text = response.text().await?;
        let chat_response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| TroupeError::api(format!("Failed to parse OpenAI response: {}", e)))?;

        Self::to_llm_response(chat_response)
    }

    async fn chat_stream(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<TextStream> {
        let request = Self::build_request(model, messages, &[], options.unwrap_or_default(), true);
        let response = self.post(&request).await?;
        Ok(sse::text_stream(response, "OpenAI", Self::stream_event))
    }

    fn is_ready(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    fn name(&self) -> &str {
        "openai"
    }
}
