//! Core types shared by every component
//!
//! Messages flow into the orchestrator, tool descriptors/calls/results flow
//! between the registry, extractor and invoker, and stream events flow out to
//! the caller.

mod message;
mod model;
mod tool;
mod stream;
mod cancellation;

pub use message::{ChatMessage, MessageRole};
pub use model::ModelCapabilities;
pub use tool::{Tool, ToolCall, ToolDescriptor, ToolResult};
pub use stream::{StreamChunk, StreamEvent};
pub use cancellation::CancellationToken;
