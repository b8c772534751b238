//! Tool registry - manages and dispatches tool calls
//!
//! Holds the tools an agent exposes and routes model-issued calls to their
//! handlers. The schema list keeps registration order; when two tools share
//! a name, lookup resolves to the one registered last.

use serde_json::Value;
use std::collections::HashMap;

use crate::core::text::preview;
use crate::core::{Result, ToolCall, ToolDefinition, TroupeError};
use crate::tools::tool::Tool;

/// Characters of arguments/results shown in logs
const LOG_PREVIEW_CHARS: usize = 200;

/// Registry of available tools
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    /// Name to position in `tools`, last registration wins
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, tool: Tool) {
        self.index.insert(tool.name().to_string(), self.tools.len());
        self.tools.push(tool);
    }

    /// Look a tool up by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Every registered tool, in registration order
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all tool definitions, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(Tool::definition).collect()
    }

    /// Invoke a tool by name with encoded or structured arguments
    pub fn invoke(&self, name: &str, arguments: &Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| TroupeError::ToolNotFound(name.to_string()))?;
        tool.invoke(arguments)
    }

    /// Execute a tool call
    pub fn execute(&self, call: &ToolCall) -> Result<Value> {
        let args_text = call.arguments_text();
        tracing::debug!(
            tool = %call.name,
            call_id = %call.id,
            args = preview(&args_text, LOG_PREVIEW_CHARS),
            "Executing tool"
        );

        match self.invoke(&call.name, &call.arguments) {
            Ok(output) => {
                let rendered = render_output(&output);
                tracing::debug!(
                    tool = %call.name,
                    result = preview(&rendered, LOG_PREVIEW_CHARS),
                    "Tool succeeded"
                );
                Ok(output)
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool failed");
                Err(e)
            }
        }
    }
}

impl FromIterator<Tool> for ToolRegistry {
    fn from_iter<I: IntoIterator<Item = Tool>>(iter: I) -> Self {
        let mut registry = Self::new();
        for tool in iter {
            registry.register(tool);
        }
        registry
    }
}

/// Text form of a tool result: strings as-is, anything else as JSON
pub fn render_output(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
