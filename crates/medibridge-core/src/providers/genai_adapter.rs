//! Adapter between medibridge-core types and genai types
//!
//! Conversion functions between our types and genai's types, plus client
//! construction with explicit auth and endpoint resolution.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use genai::chat::{
    ChatMessage as GenaiMessage, ChatOptions as GenaiOptions,
    ChatStreamEvent, Tool as GenaiTool, ToolCall as GenaiToolCall,
};
use genai::resolver::{AuthData, AuthResolver, Endpoint, ServiceTargetResolver};
use genai::{adapter::AdapterKind, Client, ModelIden, ServiceTarget};
use once_cell::sync::Lazy;

use crate::types::{ChatMessage, MessageRole, StreamChunk, Tool, ToolCall};

use super::error::ProviderError;
use super::traits::{ProviderModelConfig, StreamChatOptions};

// ============================================================================
// Message Conversion: medibridge -> genai
// ============================================================================

/// Convert ChatMessage to genai ChatMessage
pub fn to_genai_message(msg: ChatMessage) -> GenaiMessage {
    match msg.role {
        MessageRole::System => GenaiMessage::system(msg.content),
        MessageRole::User => GenaiMessage::user(msg.content),
        MessageRole::Assistant => GenaiMessage::assistant(msg.content),
    }
}

/// Convert a conversation to genai messages
pub fn to_genai_messages(messages: Vec<ChatMessage>) -> Vec<GenaiMessage> {
    messages.into_iter().map(to_genai_message).collect()
}

// ============================================================================
// Tool Conversion: medibridge -> genai
// ============================================================================

/// Convert Tool to genai Tool
pub fn to_genai_tool(tool: Tool) -> GenaiTool {
    let mut genai_tool = GenaiTool::new(&tool.name).with_description(&tool.description);

    if let Some(schema) = tool.input_schema {
        genai_tool = genai_tool.with_schema(schema);
    }

    genai_tool
}

/// Convert tools to genai tools
pub fn to_genai_tools(tools: Vec<Tool>) -> Vec<GenaiTool> {
    tools.into_iter().map(to_genai_tool).collect()
}

// ============================================================================
// Options Conversion: medibridge -> genai
// ============================================================================

/// Convert StreamChatOptions to genai ChatOptions
pub fn to_genai_options(options: &StreamChatOptions) -> GenaiOptions {
    let mut genai_opts = GenaiOptions::default();

    if let Some(temp) = options.temperature {
        genai_opts = genai_opts.with_temperature(temp as f64);
    }

    if let Some(max_tokens) = options.max_tokens {
        genai_opts = genai_opts.with_max_tokens(max_tokens);
    }

    // Capture tool calls in stream so we can return them
    genai_opts.with_capture_tool_calls(true)
}

// ============================================================================
// Response Conversion: genai -> medibridge
// ============================================================================

/// Convert genai ToolCall to ToolCall
pub fn from_genai_tool_call(tc: &GenaiToolCall) -> ToolCall {
    ToolCall::from_value(tc.fn_name.clone(), tc.fn_arguments.clone())
}

/// Convert one genai stream event to zero or more chunks
///
/// Partial tool-call deltas are ignored; the complete calls captured at the
/// end of the stream are emitted instead, all of them, in order.
pub fn from_genai_event(event: ChatStreamEvent) -> Vec<Result<StreamChunk, ProviderError>> {
    match event {
        ChatStreamEvent::Chunk(chunk) if !chunk.content.is_empty() => {
            vec![Ok(StreamChunk::text(chunk.content))]
        }
        ChatStreamEvent::End(end) => end
            .captured_tool_calls()
            .map(|calls| {
                calls
                    .iter()
                    .map(|tc| Ok(StreamChunk::tool_call(from_genai_tool_call(tc))))
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Environment variables consulted for each provider when no key is configured
static PROVIDER_ENV_VARS: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("anthropic", vec!["ANTHROPIC_API_KEY"]);
    m.insert("openai", vec!["OPENAI_API_KEY"]);
    m.insert("gemini", vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
    m.insert("groq", vec!["GROQ_API_KEY"]);
    m.insert("deepseek", vec!["DEEPSEEK_API_KEY"]);
    m.insert("mistral", vec!["MISTRAL_API_KEY"]);
    m.insert("openrouter", vec!["OPENROUTER_API_KEY"]);
    m.insert("ollama", vec![]); // Ollama doesn't need an API key
    m
});

/// Environment variable names that may hold the key for `provider`
pub fn provider_env_vars(provider: &str) -> Vec<String> {
    let provider = provider.to_lowercase();
    match PROVIDER_ENV_VARS.get(provider.as_str()) {
        Some(vars) => vars.iter().map(|v| v.to_string()).collect(),
        None => vec![format!("{}_API_KEY", provider.to_uppercase())],
    }
}

/// First non-empty key found in the environment for `provider`
pub fn api_key_from_env(provider: &str) -> Option<String> {
    provider_env_vars(provider)
        .into_iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.trim().is_empty())
}

// ============================================================================
// Client Creation with Custom Auth
// ============================================================================

/// OpenAI-compatible providers genai has no native adapter for
fn compat_endpoint(provider: &str) -> Option<&'static str> {
    match provider {
        "openrouter" => Some("https://openrouter.ai/api/v1/"),
        "mistral" => Some("https://api.mistral.ai/v1/"),
        _ => None,
    }
}

/// Create a genai Client with explicit auth and endpoint resolution
///
/// The configured key wins; otherwise the provider's environment variables
/// are consulted. A configured API base replaces the provider's endpoint.
pub fn create_client(config: &ProviderModelConfig) -> Client {
    let provider = config.provider().to_lowercase();
    let explicit_api_key = config.api_key.clone();
    let api_base = config.api_base.clone();

    let auth_provider = provider.clone();
    let auth_resolver = AuthResolver::from_resolver_async_fn(
        move |_model_iden: ModelIden| -> Pin<Box<dyn Future<Output = genai::resolver::Result<Option<AuthData>>> + Send>> {
            let provider = auth_provider.clone();
            let explicit_key = explicit_api_key.clone();

            Box::pin(async move {
                let key = explicit_key.or_else(|| api_key_from_env(&provider));
                // None lets keyless providers (ollama) through
                Ok(key.map(AuthData::from_single))
            })
        },
    );

    let target_provider = provider;
    let target_resolver = ServiceTargetResolver::from_resolver_fn(
        move |target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error> {
            let compat = compat_endpoint(&target_provider);
            if api_base.is_none() && compat.is_none() {
                return Ok(target);
            }

            let endpoint = match (&api_base, compat) {
                (Some(base), _) => Endpoint::from_owned(base.clone()),
                (None, Some(url)) => Endpoint::from_static(url),
                (None, None) => target.endpoint,
            };
            let adapter_kind = if compat.is_some() {
                AdapterKind::OpenAI
            } else {
                target.model.adapter_kind
            };

            Ok(ServiceTarget {
                endpoint,
                auth: target.auth,
                model: ModelIden::new(adapter_kind, target.model.model_name.clone()),
            })
        },
    );

    Client::builder()
        .with_auth_resolver(auth_resolver)
        .with_service_target_resolver(target_resolver)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use genai::chat::ChatRole as GenaiRole;
    use serde_json::json;

    #[test]
    fn test_message_conversion() {
        let genai_msg = to_genai_message(ChatMessage::user("¿Hay paracetamol en Piura?"));
        assert!(matches!(genai_msg.role, GenaiRole::User));
    }

    #[test]
    fn test_tool_conversion() {
        let tool = Tool::new("get_medicine_stock", "Stock for a medicine").with_schema(json!({
            "type": "object",
            "properties": {
                "medicine": { "type": "string" }
            }
        }));

        let genai_tool = to_genai_tool(tool);
        assert_eq!(genai_tool.name, "get_medicine_stock");
    }

    #[test]
    fn test_env_var_mapping() {
        assert_eq!(provider_env_vars("anthropic"), vec!["ANTHROPIC_API_KEY"]);
        assert_eq!(provider_env_vars("Gemini"), vec!["GEMINI_API_KEY", "GOOGLE_API_KEY"]);
        assert!(provider_env_vars("ollama").is_empty());
        assert_eq!(provider_env_vars("acme"), vec!["ACME_API_KEY"]);
    }
}
