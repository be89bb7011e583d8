//! Model API providers
//!
//! ## Architecture
//!
//! All real providers go through the `genai` crate, which handles:
//! - Streaming SSE parsing
//! - Provider-specific protocols (Anthropic, OpenAI, Gemini, etc.)
//! - Structured tool calling
//!
//! Providers genai has no native adapter for (OpenRouter, Mistral) are
//! reached through genai's `ServiceTargetResolver` using the OpenAI protocol.
//!
//! The `MockProvider` plays scripted replies for tests and offline runs.

mod traits;
mod error;
mod genai_adapter;
mod genai_provider;
mod mock;

// Core traits and types
pub use traits::{Provider, ProviderModelConfig, StreamChatOptions, StreamResponse};
pub use error::{ProviderError, ProviderResult};

pub use genai_provider::GenaiProvider;
pub use genai_adapter::{api_key_from_env, create_client, provider_env_vars};

// Mock provider for testing
pub use mock::{MockConfig, MockMode, MockProvider, MockReply, MockRequest};

use crate::logging::Logger;
use std::sync::Arc;

/// Create a provider for the given model identifier
///
/// `mock/...` yields an echoing `MockProvider`; everything else is handled
/// by `GenaiProvider` under the identifier's provider prefix.
pub fn create_provider(model: &ProviderModelConfig, logger: Arc<dyn Logger>) -> Arc<dyn Provider> {
    match model.provider().to_lowercase().as_str() {
        "mock" => Arc::new(MockProvider::echo(logger)),
        provider_id => Arc::new(GenaiProvider::new(provider_id, logger)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;

    #[test]
    fn test_create_provider_by_prefix() {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger::new());

        let mock = create_provider(&ProviderModelConfig::new("mock/echo"), Arc::clone(&logger));
        assert_eq!(mock.name(), "mock");

        let anthropic = create_provider(
            &ProviderModelConfig::new("claude-3-haiku-20240307"),
            Arc::clone(&logger),
        );
        assert_eq!(anthropic.name(), "anthropic");

        let openai = create_provider(&ProviderModelConfig::new("OpenAI/gpt-4o-mini"), logger);
        assert_eq!(openai.name(), "openai");
    }
}
