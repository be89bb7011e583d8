//! Bridge settings and partial configuration layers

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::{ConfigError, ConfigResult};

pub const DEFAULT_MODEL: &str = "anthropic/claude-3-haiku-20240307";
pub const DEFAULT_TOOL_HOST_URL: &str = "http://localhost:3000";

/// Where the tool host lives and how to reach it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum ToolHostEndpoint {
    /// Streamable HTTP transport
    Http { url: String },
    /// MCP over a Unix domain socket
    Unix { path: PathBuf },
    /// Spawn the host as a child process speaking MCP over stdio
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Default for ToolHostEndpoint {
    fn default() -> Self {
        ToolHostEndpoint::Http {
            url: DEFAULT_TOOL_HOST_URL.to_string(),
        }
    }
}

impl std::fmt::Display for ToolHostEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolHostEndpoint::Http { url } => write!(f, "{}", url),
            ToolHostEndpoint::Unix { path } => write!(f, "unix:{}", path.display()),
            ToolHostEndpoint::Stdio { command, args } => {
                write!(f, "stdio:{}", command)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                Ok(())
            }
        }
    }
}

/// How tool calls are obtained from the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallMode {
    /// Parse narrative tool-call sentences out of the model text
    #[default]
    Text,
    /// Offer the tools to the model and use its structured tool-use blocks
    Structured,
}

impl std::str::FromStr for ToolCallMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "narrative" => Ok(ToolCallMode::Text),
            "structured" | "native" => Ok(ToolCallMode::Structured),
            other => Err(ConfigError::InvalidValue {
                key: "tool_call_mode".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Where tool calls execute
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ExecutionConfig {
    /// Call through the shared supervised connection
    #[default]
    InProcess,
    /// Spawn one runner process per call
    IsolatedProcess {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Fully resolved bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Model identifier, `provider/model`
    pub model: String,
    /// API credential; when absent the provider's environment variable is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub tool_host: ToolHostEndpoint,
    pub execution: ExecutionConfig,
    pub tool_call_mode: ToolCallMode,
    /// Per tool call budget
    pub tool_timeout_ms: u64,
    /// Caller-side budget between two consecutive events
    pub stream_read_timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on tool rounds per turn
    pub max_tool_rounds: usize,
    /// Capacity of the per-turn event channel
    pub channel_capacity: usize,
    /// Overrides the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_base: None,
            tool_host: ToolHostEndpoint::default(),
            execution: ExecutionConfig::default(),
            tool_call_mode: ToolCallMode::default(),
            tool_timeout_ms: 30_000,
            stream_read_timeout_ms: 30_000,
            max_tokens: 2000,
            temperature: 0.7,
            max_tool_rounds: 3,
            channel_capacity: 64,
            system_prompt: None,
        }
    }
}

impl BridgeConfig {
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn stream_read_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_read_timeout_ms)
    }

    /// Apply a partial layer on top of this config
    pub fn apply(&mut self, layer: ConfigLayer) {
        if let Some(model) = layer.model {
            self.model = model;
        }
        if layer.api_key.is_some() {
            self.api_key = layer.api_key;
        }
        if layer.api_base.is_some() {
            self.api_base = layer.api_base;
        }
        if let Some(host) = layer.tool_host {
            self.tool_host = host;
        }
        if let Some(execution) = layer.execution {
            self.execution = execution;
        }
        if let Some(mode) = layer.tool_call_mode {
            self.tool_call_mode = mode;
        }
        if let Some(ms) = layer.tool_timeout_ms {
            self.tool_timeout_ms = ms;
        }
        if let Some(ms) = layer.stream_read_timeout_ms {
            self.stream_read_timeout_ms = ms;
        }
        if let Some(tokens) = layer.max_tokens {
            self.max_tokens = tokens;
        }
        if let Some(temperature) = layer.temperature {
            self.temperature = temperature;
        }
        if let Some(rounds) = layer.max_tool_rounds {
            self.max_tool_rounds = rounds;
        }
        if let Some(capacity) = layer.channel_capacity {
            self.channel_capacity = capacity;
        }
        if layer.system_prompt.is_some() {
            self.system_prompt = layer.system_prompt;
        }
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".to_string()));
        }
        if self.tool_timeout_ms == 0 {
            return Err(ConfigError::Invalid("tool_timeout_ms must be positive".to_string()));
        }
        if self.stream_read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "stream_read_timeout_ms must be positive".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} outside 0.0..=2.0",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// A partial configuration contributed by one source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_host: Option<ToolHostEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_mode: Option<ToolCallMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_read_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_rounds: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}
