//! Mock provider for testing
//!
//! Provides deterministic, configurable responses without network dependencies.
//! The `Script` mode plays back one reply per request, which is how
//! multi-round tool conversations are tested.

use async_trait::async_trait;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::error::{ProviderError, ProviderResult};
use super::traits::{Provider, ProviderModelConfig, StreamChatOptions, StreamResponse};
use crate::logging::Logger;
use crate::types::{CancellationToken, ChatMessage, MessageRole, StreamChunk, ToolCall};

/// One scripted model reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream these chunks
    Chunks(Vec<StreamChunk>),
    /// Fail the request before any chunk is produced
    Fail(String),
}

impl MockReply {
    /// A reply streamed as a single text chunk
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Chunks(vec![StreamChunk::text(text)])
    }

    /// A reply streamed as several text chunks
    pub fn text_chunks<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MockReply::Chunks(parts.into_iter().map(StreamChunk::text).collect())
    }

    /// Text followed by structured tool calls
    pub fn with_tool_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut chunks = vec![StreamChunk::text(text)];
        chunks.extend(calls.into_iter().map(StreamChunk::tool_call));
        MockReply::Chunks(chunks)
    }
}

/// Mock response mode
#[derive(Debug, Clone, Default)]
pub enum MockMode {
    /// Echo back the last user message
    #[default]
    Echo,
    /// Return a fixed response
    Fixed(String),
    /// Return response as specific chunks with delays
    Chunks(Vec<String>),
    /// Simulate a mid-stream error after some chunks
    Error { message: String, delay_chunks: usize },
    /// Return nothing (empty response)
    Empty,
    /// Play back the provider's script, one reply per request
    Script,
}

/// Configuration for the mock provider
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Response mode
    pub mode: MockMode,
    /// Delay between chunks in milliseconds (0 = no delay)
    pub chunk_delay_ms: u64,
    /// Size of each chunk when splitting fixed/echo responses
    pub chunk_size: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            mode: MockMode::Echo,
            chunk_delay_ms: 0,
            chunk_size: 10,
        }
    }
}

/// A request as the mock received it
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub messages: Vec<ChatMessage>,
    pub options: StreamChatOptions,
}

/// Mock LLM provider for testing
pub struct MockProvider {
    config: MockConfig,
    script: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<MockRequest>>,
    logger: Arc<dyn Logger>,
}

impl MockProvider {
    /// Create a new mock provider with default config
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self::with_config(MockConfig::default(), logger)
    }

    /// Create with specific config
    pub fn with_config(config: MockConfig, logger: Arc<dyn Logger>) -> Self {
        Self {
            config,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            logger,
        }
    }

    /// Create an echo provider (echoes back user message)
    pub fn echo(logger: Arc<dyn Logger>) -> Self {
        Self::new(logger)
    }

    /// Create a fixed response provider
    pub fn fixed(response: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_config(
            MockConfig {
                mode: MockMode::Fixed(response.into()),
                ..Default::default()
            },
            logger,
        )
    }

    /// Create a chunked response provider
    pub fn chunked(chunks: Vec<String>, delay_ms: u64, logger: Arc<dyn Logger>) -> Self {
        Self::with_config(
            MockConfig {
                mode: MockMode::Chunks(chunks),
                chunk_delay_ms: delay_ms,
                ..Default::default()
            },
            logger,
        )
    }

    /// Create an error-producing provider
    pub fn error(message: impl Into<String>, logger: Arc<dyn Logger>) -> Self {
        Self::with_config(
            MockConfig {
                mode: MockMode::Error {
                    message: message.into(),
                    delay_chunks: 0,
                },
                ..Default::default()
            },
            logger,
        )
    }

    /// Create a provider that answers each request with the next scripted reply
    pub fn scripted(replies: Vec<MockReply>, logger: Arc<dyn Logger>) -> Self {
        let provider = Self::with_config(
            MockConfig {
                mode: MockMode::Script,
                ..Default::default()
            },
            logger,
        );
        provider.script.lock().extend(replies);
        provider
    }

    /// Queue another scripted reply
    pub fn push_reply(&self, reply: MockReply) {
        self.script.lock().push_back(reply);
    }

    /// Set chunk delay
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.config.chunk_delay_ms = delay_ms;
        self
    }

    /// Set chunk size for splitting responses
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Extract last user message content
    fn get_last_user_message(&self, messages: &[ChatMessage]) -> String {
        messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User && !m.content.is_empty())
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "Hello from MockProvider!".to_string())
    }

    /// Split text into chunks
    fn split_into_chunks(&self, text: &str) -> Vec<String> {
        if self.config.chunk_size == 0 || text.is_empty() {
            return vec![text.to_string()];
        }

        text.chars()
            .collect::<Vec<_>>()
            .chunks(self.config.chunk_size)
            .map(|c| c.iter().collect())
            .collect()
    }

    fn texts(chunks: Vec<String>) -> Vec<ProviderResult<StreamChunk>> {
        chunks.into_iter().map(|c| Ok(StreamChunk::text(c))).collect()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        _model: ProviderModelConfig,
        options: StreamChatOptions,
        cancel_token: CancellationToken,
    ) -> ProviderResult<StreamResponse> {
        self.logger.debug("[MockProvider] stream_chat called");
        self.requests.lock().push(MockRequest {
            messages: messages.clone(),
            options,
        });

        let items: Vec<ProviderResult<StreamChunk>> = match &self.config.mode {
            MockMode::Echo => {
                let user_msg = self.get_last_user_message(&messages);
                Self::texts(self.split_into_chunks(&format!("Echo: {}", user_msg)))
            }
            MockMode::Fixed(response) => Self::texts(self.split_into_chunks(response)),
            MockMode::Chunks(chunks) => Self::texts(chunks.clone()),
            MockMode::Empty => vec![],
            MockMode::Error { message, delay_chunks } => {
                let mut items: Vec<ProviderResult<StreamChunk>> = (0..*delay_chunks)
                    .map(|i| Ok(StreamChunk::text(format!("Chunk {} before error. ", i))))
                    .collect();
                items.push(Err(ProviderError::Other(format!("Mock error: {}", message))));
                items
            }
            MockMode::Script => {
                let reply = self.script.lock().pop_front();
                match reply {
                    Some(MockReply::Chunks(chunks)) => chunks.into_iter().map(Ok).collect(),
                    Some(MockReply::Fail(message)) => {
                        self.logger
                            .debug(&format!("[MockProvider] Scripted failure: {}", message));
                        return Err(ProviderError::api_error("mock", 500, message));
                    }
                    None => {
                        return Err(ProviderError::Other("mock script exhausted".to_string()));
                    }
                }
            }
        };

        let delay_ms = self.config.chunk_delay_ms;

        let stream = stream::iter(items.into_iter().enumerate()).then(move |(i, item)| {
            let cancel = cancel_token.clone();
            async move {
                if i > 0 && delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                if cancel.is_cancelled() {
                    return Err(ProviderError::Cancelled);
                }
                item
            }
        });

        Ok(Box::pin(stream))
    }
}
