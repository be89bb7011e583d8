//! MediBridge Core
//!
//! Bridges an LLM chat API with an MCP tool host so the model can look up
//! medicine inventory data while it answers.
//!
//! ## Turn flow
//!
//! A turn goes conversation → model → tool-call extraction → tool
//! invocation → follow-up → composed answer, and the caller receives it as a
//! stream of [`StreamEvent`]s ending in `end`:
//!
//! ```rust,ignore
//! use medibridge_core::{Bridge, ConsoleLogger, load_default_config};
//!
//! let config = load_default_config().await?;
//! let bridge = Bridge::from_config(config, Arc::new(ConsoleLogger::new()))?;
//!
//! let session = bridge.session();
//! let mut turn = session.send("¿Hay paracetamol en Piura?")?;
//! while let Some(event) = turn.next().await {
//!     print!("{}", event.to_json_line());
//! }
//! ```
//!
//! Models without native tool calling narrate their calls in prose; the
//! `extractor` module recovers them. With `tool_call_mode: structured` the
//! tools are offered to the model and its tool-use blocks are used instead.

pub mod types;
pub mod logging;
pub mod config;
pub mod error;
pub mod providers;
pub mod mcp;
pub mod connection;
pub mod tools;
pub mod extractor;
pub mod orchestrator;
pub mod session;
pub mod bridge;

// Re-export commonly used types
pub use types::{
    CancellationToken, ChatMessage, MessageRole, ModelCapabilities, StreamChunk, StreamEvent,
    Tool, ToolCall, ToolDescriptor, ToolResult,
};

pub use logging::{ConsoleLogger, Logger, MemoryLogger, NoOpLogger};

pub use config::{
    load_default_config, resolve_config, BridgeConfig, ConfigError, ConfigProvider,
    EnvConfigProvider, FileConfigProvider, MemoryConfigProvider, ToolCallMode, ToolHostEndpoint,
};

pub use error::{BridgeError, BridgeResult};

pub use providers::{create_provider, GenaiProvider, MockProvider, Provider, ProviderError};

pub use mcp::{
    McpClient, McpConnector, McpError, ResourceDescriptor, StubToolHost, ToolHost,
    ToolHostConnector,
};

pub use connection::{ConnectionSupervisor, HostSession};

pub use tools::{ToolExecutionStrategy, ToolInvoker, ToolRegistry};

pub use extractor::{Extraction, ToolCallExtractor};

pub use orchestrator::{ResponseOrchestrator, TurnState, TurnStream};

pub use session::{ChatSession, SessionError, SessionTurn};

pub use bridge::{Bridge, HealthStatus};
