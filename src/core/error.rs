//! Custom error types for Troupe
//!
//! Provides a unified error handling system across all modules.

use thiserror::Error;

/// Main error type for Troupe operations
#[derive(Error, Debug)]
pub enum TroupeError {
    /// Endpoint not ready, missing credentials or invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaboration needs at least one agent
    #[error("At least one agent is required for collaboration")]
    NoAgents,

    /// Transport failures talking to the model endpoint
    #[error("API error: {0}")]
    Api(String),

    /// The model asked for a tool that is not registered
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    /// Tool arguments could not be decoded
    #[error("Invalid tool arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// A required tool parameter is missing
    #[error("Validation error: {0}")]
    Validation(String),

    /// The tool handler itself failed
    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Troupe operations
pub type Result<T> = std::result::Result<T, TroupeError>;

impl TroupeError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an API (transport) error
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Create an invalid-arguments error for a tool
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a tool execution error
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Errors raised while resolving or running a tool.
    ///
    /// These are reported back to the model as text instead of aborting a chat.
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound(_)
                | Self::InvalidArguments { .. }
                | Self::Validation(_)
                | Self::ToolExecution { .. }
        )
    }
}
