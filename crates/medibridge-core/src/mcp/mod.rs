//! MCP (Model Context Protocol) tool host access
//!
//! Uses the official rmcp SDK to connect to MCP servers over HTTP, a Unix
//! socket, or a spawned stdio process. Everything above this module talks to
//! a host through [`ToolHost`] and [`ToolHostConnector`].
//!
//! # Example
//!
//! ```rust,ignore
//! use medibridge_core::mcp::{McpClient, ToolHost};
//! use std::sync::Arc;
//!
//! let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
//!
//! let client = McpClient::connect_http("http://localhost:3000/mcp", logger).await?;
//! let tools = client.list_tools().await?;
//!
//! let result = client.call_tool("search_medicines", json!({
//!     "query": "paracetamol"
//! })).await?;
//! ```

mod client;
mod host;
mod stub;

pub use client::{McpClient, McpConnector, McpError, McpResult};
pub use host::{ResourceDescriptor, ToolHost, ToolHostConnector};
pub use stub::{StubConnector, StubReply, StubToolHost};

// Re-export rmcp types that consumers might need
pub use rmcp::model::{Tool as McpTool, CallToolResult as McpToolResult};
