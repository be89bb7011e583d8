//! Tool host seam
//!
//! The bridge talks to a tool host only through these two traits, so the
//! rmcp-backed [`McpClient`](super::McpClient) and the in-memory
//! [`StubToolHost`](super::StubToolHost) are interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ToolDescriptor;

use super::client::{McpError, McpResult};

/// A read-only resource published by the tool host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// An established session with a tool host
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// List the tools the host currently exposes
    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>>;

    /// Call a tool and return the host's raw result as JSON
    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<Value>;

    /// Resources the host publishes; hosts without resources list none
    async fn list_resources(&self) -> McpResult<Vec<ResourceDescriptor>> {
        Ok(Vec::new())
    }

    /// Read one resource, returning the host's raw contents as JSON
    async fn read_resource(&self, uri: &str) -> McpResult<Value> {
        Err(McpError::Protocol(format!("Unknown resource: {}", uri)))
    }

    /// Tear the session down; later calls fail
    async fn close(&self) -> McpResult<()>;
}

/// Opens new sessions with a tool host
#[async_trait]
pub trait ToolHostConnector: Send + Sync {
    /// Human-readable address for logs
    fn describe(&self) -> String;

    async fn connect(&self) -> McpResult<Arc<dyn ToolHost>>;
}
