//! Provider trait definition

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::types::{CancellationToken, ChatMessage, ModelCapabilities, StreamChunk, Tool};
use super::error::ProviderResult;

/// Model configuration for provider requests
#[derive(Debug, Clone)]
pub struct ProviderModelConfig {
    /// Model identifier, `provider/model` (e.g. `anthropic/claude-3-haiku-20240307`)
    pub model: String,
    /// API key for authentication
    pub api_key: Option<String>,
    /// Custom API base URL
    pub api_base: Option<String>,
}

impl ProviderModelConfig {
    /// Create a new model config
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            api_base: None,
        }
    }

    /// Set the API key
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the API base URL
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    /// Provider part of the identifier (`anthropic` for `anthropic/claude-3`)
    pub fn provider(&self) -> &str {
        match self.model.split_once('/') {
            Some((provider, _)) => provider,
            None => "anthropic",
        }
    }

    /// Model part of the identifier (`claude-3` for `anthropic/claude-3`)
    pub fn model_name(&self) -> &str {
        match self.model.split_once('/') {
            Some((_, name)) => name,
            None => &self.model,
        }
    }
}

/// Options for streaming chat requests
#[derive(Debug, Clone, Default)]
pub struct StreamChatOptions {
    /// Temperature for response generation (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Tools offered to the model for structured tool use
    pub tools: Option<Vec<Tool>>,
}

impl StreamChatOptions {
    /// Create new options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set temperature
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Set tools
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }
}

/// Type alias for the streaming response
pub type StreamResponse = Pin<Box<dyn Stream<Item = ProviderResult<StreamChunk>> + Send>>;

/// Model API seam
///
/// Implementations stream text deltas and, when the model supports it,
/// complete structured tool calls.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name (e.g., "anthropic", "mock")
    fn name(&self) -> &str;

    /// What the provider's models can do
    fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities::full()
    }

    /// Stream a chat completion
    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        model: ProviderModelConfig,
        options: StreamChatOptions,
        cancel_token: CancellationToken,
    ) -> ProviderResult<StreamResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_identifier_parts() {
        let config = ProviderModelConfig::new("anthropic/claude-3-haiku-20240307");
        assert_eq!(config.provider(), "anthropic");
        assert_eq!(config.model_name(), "claude-3-haiku-20240307");

        let bare = ProviderModelConfig::new("claude-3-haiku-20240307");
        assert_eq!(bare.provider(), "anthropic");
        assert_eq!(bare.model_name(), "claude-3-haiku-20240307");
    }
}
