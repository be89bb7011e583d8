//! Environment variable configuration provider

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;

use super::settings::{ConfigLayer, ExecutionConfig, ToolCallMode, ToolHostEndpoint};
use super::traits::{ConfigError, ConfigProvider, ConfigResult};

/// Reads configuration from environment variables
///
/// | Variable | Field |
/// |---|---|
/// | `MEDIBRIDGE_MODEL` | `model` (`provider/model`) |
/// | `ANTHROPIC_MODEL` | `model`, prefixed with `anthropic/` |
/// | `MEDIBRIDGE_API_KEY` | `api_key` |
/// | `MEDIBRIDGE_API_BASE` | `api_base` |
/// | `MCP_SERVER_URL` | `tool_host` (HTTP) |
/// | `MEDIBRIDGE_TOOL_HOST_SOCKET` | `tool_host` (Unix socket) |
/// | `MEDIBRIDGE_TOOL_HOST_COMMAND` | `tool_host` (stdio child, whitespace-split) |
/// | `MEDIBRIDGE_TOOL_RUNNER` | `execution` (isolated process, whitespace-split) |
/// | `MEDIBRIDGE_TOOL_CALL_MODE` | `tool_call_mode` (`text` / `structured`) |
/// | `MEDIBRIDGE_TOOL_TIMEOUT_MS` | `tool_timeout_ms` |
/// | `MEDIBRIDGE_STREAM_TIMEOUT_MS` | `stream_read_timeout_ms` |
/// | `MEDIBRIDGE_MAX_TOKENS` | `max_tokens` |
/// | `MEDIBRIDGE_TEMPERATURE` | `temperature` |
/// | `MEDIBRIDGE_MAX_TOOL_ROUNDS` | `max_tool_rounds` |
/// | `MEDIBRIDGE_SYSTEM_PROMPT` | `system_prompt` |
///
/// Provider API keys such as `ANTHROPIC_API_KEY` are not read here; the
/// provider looks them up at request time when no explicit key is set.
#[derive(Debug, Default)]
pub struct EnvConfigProvider {
    vars: HashMap<String, String>,
}

impl EnvConfigProvider {
    /// Snapshot the current process environment
    pub fn new() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from explicit key/value pairs
    pub fn from_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .filter(|(_, v)| !v.trim().is_empty())
                .collect(),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).map(|v| v.trim().to_string())
    }

    fn parse<T: FromStr>(&self, key: &str) -> ConfigResult<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        }
    }

    fn command_line(raw: &str) -> Option<(String, Vec<String>)> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some((program, parts.collect()))
    }

    fn tool_host(&self) -> Option<ToolHostEndpoint> {
        if let Some((command, args)) = self
            .get("MEDIBRIDGE_TOOL_HOST_COMMAND")
            .and_then(|raw| Self::command_line(&raw))
        {
            return Some(ToolHostEndpoint::Stdio { command, args });
        }
        if let Some(path) = self.get("MEDIBRIDGE_TOOL_HOST_SOCKET") {
            return Some(ToolHostEndpoint::Unix {
                path: PathBuf::from(path),
            });
        }
        self.get("MCP_SERVER_URL")
            .map(|url| ToolHostEndpoint::Http { url })
    }

    fn model(&self) -> Option<String> {
        self.get("MEDIBRIDGE_MODEL").or_else(|| {
            self.get("ANTHROPIC_MODEL").map(|model| {
                if model.contains('/') {
                    model
                } else {
                    format!("anthropic/{}", model)
                }
            })
        })
    }
}

#[async_trait]
impl ConfigProvider for EnvConfigProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn load(&self) -> ConfigResult<ConfigLayer> {
        let execution = self
            .get("MEDIBRIDGE_TOOL_RUNNER")
            .and_then(|raw| Self::command_line(&raw))
            .map(|(program, args)| ExecutionConfig::IsolatedProcess { program, args });

        Ok(ConfigLayer {
            model: self.model(),
            api_key: self.get("MEDIBRIDGE_API_KEY"),
            api_base: self.get("MEDIBRIDGE_API_BASE"),
            tool_host: self.tool_host(),
            execution,
            tool_call_mode: self.parse::<ToolCallMode>("MEDIBRIDGE_TOOL_CALL_MODE")?,
            tool_timeout_ms: self.parse("MEDIBRIDGE_TOOL_TIMEOUT_MS")?,
            stream_read_timeout_ms: self.parse("MEDIBRIDGE_STREAM_TIMEOUT_MS")?,
            max_tokens: self.parse("MEDIBRIDGE_MAX_TOKENS")?,
            temperature: self.parse("MEDIBRIDGE_TEMPERATURE")?,
            max_tool_rounds: self.parse("MEDIBRIDGE_MAX_TOOL_ROUNDS")?,
            channel_capacity: None,
            system_prompt: self.get("MEDIBRIDGE_SYSTEM_PROMPT"),
        })
    }
}
