//! Scripted provider for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core::{Config, Message, Result, ToolDefinition, TroupeError};
use crate::llm::{GenerateOptions, LLMProvider, LLMResponse, ModelClient, ToolChoice};

/// One request as seen by the provider
#[derive(Debug, Clone)]
pub(crate) struct Request {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub tool_choice: ToolChoice,
}

impl Request {
    /// Content of the last user message
    pub fn user_text(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    /// Content of the first system message
    pub fn system_text(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.is_system())
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

type Handler = Box<dyn Fn(&Request) -> Result<LLMResponse> + Send + Sync>;

pub(crate) struct ScriptedProvider {
    handler: Handler,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedProvider {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&Request) -> Result<LLMResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Replies in order, then fails
    pub fn queue(responses: Vec<LLMResponse>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| TroupeError::api("script exhausted"))
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let options = options.unwrap_or_default();
        let request = Request {
            model: model.to_string(),
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            temperature: options.temperature,
            tool_choice: options.tool_choice,
        };
        let response = (self.handler)(&request);
        self.requests.lock().unwrap().push(request);
        response
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub(crate) fn client_for(provider: Arc<ScriptedProvider>) -> ModelClient {
    ModelClient::new(provider, Config::default())
}
