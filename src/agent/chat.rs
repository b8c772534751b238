//! Single agent with a tool-calling chat cycle
//!
//! One `chat` call produces one assistant reply. When the model asks for
//! tools, they run against the agent's registry, their results are appended
//! to the conversation, and the model is asked once more for the final reply.
//! Tool failures become text the model can react to; transport failures
//! propagate to the caller.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::agent::memory::{Memory, MemoryEntry};
use crate::core::runtime::blocking_runtime;
use crate::core::{Message, Result, ToolCall, ToolResult};
use crate::llm::ModelClient;
use crate::tools::{render_output, Tool, ToolRegistry};

/// Name given to agents that were not named explicitly
pub const DEFAULT_AGENT_NAME: &str = "Agent";

/// Memory statistics for one agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentMemoryStats {
    pub entries: usize,
    pub max_entries: usize,
    pub tools_used: BTreeSet<String>,
}

/// A system prompt, a tool set and a bounded memory bound to one endpoint
pub struct Agent {
    name: String,
    system_prompt: String,
    tools: ToolRegistry,
    client: ModelClient,
    model: Option<String>,
    temperature: Option<f32>,
    memory: Mutex<Memory>,
}

/// Builder for creating Agents
pub struct AgentBuilder {
    name: String,
    system_prompt: Option<String>,
    tools: ToolRegistry,
    use_memory: bool,
    memory_size: Option<usize>,
    model: Option<String>,
    temperature: Option<f32>,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            system_prompt: None,
            tools: ToolRegistry::new(),
            use_memory: true,
            memory_size: None,
            model: None,
            temperature: None,
        }
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the agent name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Register one tool
    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.register(tool);
        self
    }

    /// Register several tools
    pub fn tools(mut self, tools: impl IntoIterator<Item = Tool>) -> Self {
        for tool in tools {
            self.tools.register(tool);
        }
        self
    }

    /// Remember tool results between chats (default: on)
    pub fn use_memory(mut self, enabled: bool) -> Self {
        self.use_memory = enabled;
        self
    }

    /// Number of tool results kept in memory
    pub fn memory_size(mut self, size: usize) -> Self {
        self.memory_size = Some(size);
        self
    }

    /// Override the configured model for this agent
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the configured temperature for this agent
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Build the Agent against a model endpoint.
    ///
    /// Fails with a configuration error when the endpoint is not ready.
    pub fn build(self, client: ModelClient) -> Result<Agent> {
        client.ensure_ready()?;

        let defaults = &client.config().agent;
        let memory = if self.use_memory {
            Memory::new(self.memory_size.unwrap_or(defaults.memory_size))
        } else {
            Memory::disabled()
        };

        Ok(Agent {
            system_prompt: self
                .system_prompt
                .unwrap_or_else(|| defaults.system_prompt.clone()),
            name: self.name,
            tools: self.tools,
            model: self.model,
            temperature: self.temperature,
            memory: Mutex::new(memory),
            client,
        })
    }
}

impl Agent {
    /// Create a builder for more control
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Agent with default settings and the given system prompt
    pub fn new(client: ModelClient, system_prompt: impl Into<String>) -> Result<Self> {
        AgentBuilder::new().system_prompt(system_prompt).build(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn has_default_name(&self) -> bool {
        self.name == DEFAULT_AGENT_NAME
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn uses_memory(&self) -> bool {
        self.memory().is_enabled()
    }

    /// Answer one message, running any tools the model requests.
    pub async fn chat(&self, message: &str) -> Result<String> {
        let mut messages = vec![Message::system(&self.system_prompt)];
        if let Some(summary) = self.memory_summary() {
            messages.push(Message::system(summary));
        }
        messages.push(Message::user(message));

        let definitions = self.tools.definitions();
        let response = self
            .client
            .send(
                &messages,
                &definitions,
                self.model.as_deref(),
                self.temperature,
            )
            .await?;

        if !response.has_tool_calls() {
            return Ok(response.content);
        }

        tracing::debug!(
            agent = %self.name,
            calls = response.tool_calls.len(),
            "Model requested tools"
        );

        let results: Vec<ToolResult> = response
            .tool_calls
            .iter()
            .map(|call| self.run_tool(call))
            .collect();

        messages.push(Message::assistant_tool_calls(
            response.content,
            response.tool_calls,
        ));
        for result in &results {
            messages.push(Message::tool_result(&result.call_id, &result.output));
        }

        let reply = self
            .client
            .send_tool_results(
                &messages,
                &definitions,
                self.model.as_deref(),
                self.temperature,
            )
            .await?;

        let mut memory = self.memory();
        for result in results {
            memory.push(result.tool_name, result.output);
        }

        Ok(reply.content)
    }

    /// `chat` for synchronous callers.
    ///
    /// Runs on a private current-thread runtime; inside an async context it
    /// returns a `Config` error.
    pub fn chat_blocking(&self, message: &str) -> Result<String> {
        blocking_runtime()?.block_on(self.chat(message))
    }

    /// Forget remembered tool results
    pub fn clear_memory(&self) {
        self.memory().clear();
    }

    /// Remembered `(tool, result)` entries, oldest first
    pub fn memory_snapshot(&self) -> Vec<MemoryEntry> {
        self.memory().snapshot()
    }

    pub fn memory_stats(&self) -> AgentMemoryStats {
        let memory = self.memory();
        AgentMemoryStats {
            entries: memory.len(),
            max_entries: memory.capacity(),
            tools_used: memory.iter().map(|e| e.label.clone()).collect(),
        }
    }

    fn run_tool(&self, call: &ToolCall) -> ToolResult {
        match self.tools.execute(call) {
            Ok(output) => ToolResult::success(call, render_output(&output)),
            Err(e) => ToolResult::failure(call, e.to_string()),
        }
    }

    fn memory_summary(&self) -> Option<String> {
        let memory = self.memory();
        if memory.is_empty() {
            return None;
        }

        let mut summary = String::from("Previous tool results:\n");
        for entry in memory.iter() {
            summary.push_str(&format!("- {}: {}\n", entry.label, entry.value));
        }
        Some(summary)
    }

    fn memory(&self) -> MutexGuard<'_, Memory> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tools.len())
            .field("memory", &self.memory().len())
            .finish()
    }
}
