//! Shared types used across Troupe modules
//!
//! Contains message structures, tool definitions, and common data types.

use serde::{Deserialize, Serialize};

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (user, assistant, system, tool)
    pub role: String,
    /// Content of the message
    pub content: String,
    /// Tool calls requested by the assistant in this turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Call id this message answers (tool results only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Assistant turn carrying the tool calls it requested
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::new("assistant", content)
        }
    }

    /// Result of one tool call, associated with the call id
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::new("tool", content)
        }
    }

    pub fn is_system(&self) -> bool {
        self.role == "system"
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == "tool"
    }
}

/// A tool call made by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// Arguments, either a JSON-encoded string or an object
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Arguments as an object, decoding them first if they arrived as text.
    ///
    /// Returns `None` when the payload cannot be interpreted as an object.
    pub fn arguments_object(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        match &self.arguments {
            serde_json::Value::Object(map) => Some(map.clone()),
            serde_json::Value::String(text) if text.trim().is_empty() => {
                Some(serde_json::Map::new())
            }
            serde_json::Value::String(text) => serde_json::from_str(text).ok(),
            serde_json::Value::Null => Some(serde_json::Map::new()),
            _ => None,
        }
    }

    /// Arguments as encoded JSON text (the OpenAI wire shape)
    pub fn arguments_text(&self) -> String {
        match &self.arguments {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// Definition of a tool that can be called by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Result of executing a tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Name of the tool that was executed
    pub tool_name: String,
    /// Id of the call this result answers
    pub call_id: String,
    /// Whether the execution was successful
    pub success: bool,
    /// Output from the tool, or the error text
    pub output: String,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(call: &ToolCall, output: impl Into<String>) -> Self {
        Self {
            tool_name: call.name.clone(),
            call_id: call.id.clone(),
            success: true,
            output: output.into(),
        }
    }

    /// Create a failed result
    pub fn failure(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            tool_name: call.name.clone(),
            call_id: call.id.clone(),
            success: false,
            output: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arguments_from_text_and_object() {
        let encoded = ToolCall::new("c1", "add", json!("{\"a\": 2, \"b\": 3}"));
        let structured = ToolCall::new("c2", "add", json!({"a": 2, "b": 3}));

        assert_eq!(encoded.arguments_object(), structured.arguments_object());
        assert_eq!(structured.arguments_text(), "{\"a\":2,\"b\":3}");
    }

    #[test]
    fn test_malformed_arguments() {
        let call = ToolCall::new("c1", "add", json!("{a: 2"));
        assert!(call.arguments_object().is_none());

        let call = ToolCall::new("c1", "add", json!([1, 2]));
        assert!(call.arguments_object().is_none());
    }

    #[test]
    fn test_tool_result_message_serialization() {
        let msg = Message::tool_result("call_1", "5");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_1");
        assert!(value.get("tool_calls").is_none());
    }
}
