//! Configuration management for Troupe
//!
//! Supports environment variables, config files, and runtime overrides.
//! One `Config` is built per endpoint and shared by handle with every agent
//! and collaboration that talks to it.
//!
//! Config file location: ~/.config/troupe/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::error::{Result, TroupeError};

const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-3.5-turbo", "gpt-4-turbo"];
const CLAUDE_MODELS: &[&str] = &[
    "claude-3-5-sonnet-20241022",
    "claude-3-opus-20240229",
    "claude-3-haiku-20240307",
];

/// Main configuration for Troupe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hosted provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Model defaults
    #[serde(default)]
    pub model: ModelConfig,
    /// Single agent defaults
    #[serde(default)]
    pub agent: AgentConfig,
    /// Collaboration defaults
    #[serde(default)]
    pub collaboration: CollaborationConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which hosted API to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Claude,
}

impl ProviderKind {
    /// Environment variable holding the API key for this provider
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Claude => "ANTHROPIC_API_KEY",
        }
    }

    /// Default model when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "gpt-4o",
            ProviderKind::Claude => "claude-3-5-sonnet-20241022",
        }
    }

    /// Default API base URL
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Claude => "https://api.anthropic.com/v1",
        }
    }

    fn known_models(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAI => OPENAI_MODELS,
            ProviderKind::Claude => CLAUDE_MODELS,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAI => write!(f, "openai"),
            ProviderKind::Claude => write!(f, "claude"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = TroupeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            other => Err(TroupeError::config(format!(
                "Provider must be 'openai' or 'claude', got '{}'",
                other
            ))),
        }
    }
}

/// Hosted provider connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider kind
    pub kind: ProviderKind,
    /// API key; never written back to disk
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Override for the API base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient transport failures
    pub max_retries: u32,
    /// First retry delay; doubles on each attempt
    pub retry_base_delay_ms: u64,
}

/// Model defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Default model identifier
    pub name: String,
    /// Default sampling temperature (0.0 - 2.0)
    pub temperature: f32,
    /// Maximum tokens in a reply
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Single agent defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// System prompt used when an agent does not set one
    pub system_prompt: String,
    /// Tool-result memory capacity per agent
    /// Default: 20
    pub memory_size: usize,
}

/// Collaboration defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborationConfig {
    /// Whether agents share a memory of step outputs
    pub shared_memory: bool,
    /// Shared memory capacity
    /// Default: 50
    pub memory_size: usize,
    /// Sampling temperature for the planning call
    pub planning_temperature: f32,
    /// Model used for planning (defaults to the model default)
    #[serde(default)]
    pub planning_model: Option<String>,
    /// Characters of each prior output carried into later step prompts
    pub preview_chars: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when neither RUST_LOG nor LOG_LEVEL is set
    pub level: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::OpenAI,
            api_key: None,
            base_url: None,
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: ProviderKind::OpenAI.default_model().to_string(),
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful AI assistant.".to_string(),
            memory_size: 20,
        }
    }
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        Self {
            shared_memory: true,
            memory_size: 50,
            planning_temperature: 0.3,
            planning_model: None,
            preview_chars: 200,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults for a provider, with that provider's default model
    pub fn for_provider(kind: ProviderKind) -> Self {
        let mut config = Config::default();
        config.provider.kind = kind;
        config.model.name = kind.default_model().to_string();
        config
    }

    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("troupe")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        // Try to load .env file if it exists
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from_file().unwrap_or_default();
        config.apply_env();
        config
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(TroupeError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| TroupeError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TroupeError::config(format!("Failed to parse config: {}", e)))
    }

    /// Overlay environment variables onto the current values
    pub fn apply_env(&mut self) {
        if let Some(kind) = env::var("TROUPE_PROVIDER")
            .ok()
            .and_then(|p| p.parse::<ProviderKind>().ok())
        {
            if kind != self.provider.kind {
                self.set_provider(kind);
            }
        }

        if self.provider.api_key.is_none() {
            self.resolve_api_key();
        }

        if let Ok(model) = env::var("TROUPE_MODEL") {
            self.model.name = model;
        }

        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
    }

    /// Read the API key from the provider's environment variable
    pub fn resolve_api_key(&mut self) {
        self.provider.api_key = env::var(self.provider.kind.api_key_var())
            .ok()
            .filter(|k| !k.trim().is_empty());
    }

    /// Switch provider, resetting the model to that provider's default
    pub fn set_provider(&mut self, kind: ProviderKind) {
        self.provider.kind = kind;
        self.provider.api_key = None;
        self.model.name = kind.default_model().to_string();
    }

    /// Check the settings that would otherwise fail at request time
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(TroupeError::config("Temperature must be between 0 and 2"));
        }

        if !(0.0..=2.0).contains(&self.collaboration.planning_temperature) {
            return Err(TroupeError::config(
                "Planning temperature must be between 0 and 2",
            ));
        }

        if let Some(ref base_url) = self.provider.base_url {
            url::Url::parse(base_url).map_err(|e| {
                TroupeError::config(format!("Invalid base URL '{}': {}", base_url, e))
            })?;
        }

        if !self.is_known_model(&self.model.name) {
            tracing::warn!(
                provider = %self.provider.kind,
                model = %self.model.name,
                "Unknown model for provider"
            );
        }

        Ok(())
    }

    /// Whether an API key has been resolved for the provider
    pub fn is_ready(&self) -> bool {
        self.provider
            .api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }

    /// Error returned when the endpoint is used without credentials
    pub fn not_ready_error(&self) -> TroupeError {
        TroupeError::config(format!(
            "API key required for {}. Set {} environment variable or provide api_key in {}",
            self.provider.kind,
            self.provider.kind.api_key_var(),
            Self::config_file().display()
        ))
    }

    /// API base URL, with the provider default as fallback
    pub fn base_url(&self) -> String {
        self.provider
            .base_url
            .clone()
            .unwrap_or_else(|| self.provider.kind.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Check if a model is in the provider's known list
    pub fn is_known_model(&self, model: &str) -> bool {
        self.provider.kind.known_models().contains(&model)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| TroupeError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TroupeError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| TroupeError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}
