//! MCP client using the official rmcp SDK
//!
//! Connects to MCP servers over streamable HTTP, a Unix socket, or a child
//! process speaking stdio.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    ServiceExt,
    model::{
        CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation,
        ReadResourceRequestParams, Resource, Tool,
    },
    service::RunningService,
    RoleClient,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

#[cfg(unix)]
use tokio::net::UnixStream;

use crate::config::ToolHostEndpoint;
use crate::logging::Logger;
use crate::types::ToolDescriptor;

use super::host::{ResourceDescriptor, ToolHost, ToolHostConnector};

/// MCP client errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not connected")]
    NotConnected,
}

impl McpError {
    /// Whether the session itself is unusable (as opposed to one failed call)
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            McpError::ConnectionFailed(_)
                | McpError::InitializationFailed(_)
                | McpError::Io(_)
                | McpError::NotConnected
        )
    }
}

pub type McpResult<T> = Result<T, McpError>;

impl From<Tool> for ToolDescriptor {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|s| s.to_string()).unwrap_or_default(),
            // input_schema is Arc<JsonObject>, convert to Value
            input_schema: serde_json::to_value(tool.input_schema.as_ref()).unwrap_or_default(),
        }
    }
}

impl From<Resource> for ResourceDescriptor {
    fn from(resource: Resource) -> Self {
        let raw = resource.raw;
        Self {
            uri: raw.uri,
            name: raw.name,
            description: raw.description,
            mime_type: raw.mime_type,
        }
    }
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "medibridge-core".to_string(),
            title: Some("MediBridge".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

/// Convert an rmcp call result into a plain JSON value
///
/// Falls back to the debug rendering when the result does not serialize.
fn raw_result_value(result: &CallToolResult) -> Value {
    serde_json::to_value(result).unwrap_or_else(|_| Value::String(format!("{:?}", result)))
}

/// MCP client for a medicine-inventory (or any other) tool host
pub struct McpClient {
    /// The underlying rmcp running service; `None` once closed
    client: RwLock<Option<RunningService<RoleClient, ClientInfo>>>,
    /// Logger
    logger: Arc<dyn Logger>,
}

impl McpClient {
    fn from_service(client: RunningService<RoleClient, ClientInfo>, logger: Arc<dyn Logger>) -> Self {
        Self {
            client: RwLock::new(Some(client)),
            logger,
        }
    }

    /// Connect to an MCP server over a Unix socket
    #[cfg(unix)]
    pub async fn connect_unix<P: AsRef<Path>>(
        socket_path: P,
        logger: Arc<dyn Logger>,
    ) -> McpResult<Self> {
        let path = socket_path.as_ref();
        logger.info(&format!("[McpClient] Connecting to Unix socket: {:?}", path));

        let stream = UnixStream::connect(path)
            .await
            .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;

        let client = client_info()
            .serve(stream)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info("[McpClient] Connected and initialized successfully");

        Ok(Self::from_service(client, logger))
    }

    /// Unix sockets are unavailable on this platform
    #[cfg(not(unix))]
    pub async fn connect_unix<P: AsRef<Path>>(
        socket_path: P,
        _logger: Arc<dyn Logger>,
    ) -> McpResult<Self> {
        Err(McpError::ConnectionFailed(format!(
            "Unix sockets are not supported on this platform: {:?}",
            socket_path.as_ref()
        )))
    }

    /// Connect to an MCP server over HTTP (Streamable HTTP transport)
    pub async fn connect_http(url: &str, logger: Arc<dyn Logger>) -> McpResult<Self> {
        use rmcp::transport::StreamableHttpClientTransport;

        logger.info(&format!("[McpClient] Connecting to HTTP: {}", url));

        let transport = StreamableHttpClientTransport::from_uri(url);

        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info("[McpClient] Connected and initialized successfully");

        Ok(Self::from_service(client, logger))
    }

    /// Spawn the MCP server as a child process and talk to it over stdio
    pub async fn connect_stdio(
        command: &str,
        args: &[String],
        logger: Arc<dyn Logger>,
    ) -> McpResult<Self> {
        use rmcp::transport::TokioChildProcess;

        logger.info(&format!("[McpClient] Spawning stdio server: {} {:?}", command, args));

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args);
        let transport = TokioChildProcess::new(cmd)
            .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;

        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info("[McpClient] Connected and initialized successfully");

        Ok(Self::from_service(client, logger))
    }

    /// Connect using a configured endpoint
    pub async fn connect(endpoint: &ToolHostEndpoint, logger: Arc<dyn Logger>) -> McpResult<Self> {
        match endpoint {
            ToolHostEndpoint::Http { url } => Self::connect_http(url, logger).await,
            ToolHostEndpoint::Unix { path } => Self::connect_unix(path, logger).await,
            ToolHostEndpoint::Stdio { command, args } => {
                Self::connect_stdio(command, args, logger).await
            }
        }
    }

    /// Call a tool by name, returning the rmcp result
    pub async fn call_tool_raw(&self, name: &str, arguments: Value) -> McpResult<CallToolResult> {
        self.logger.info(&format!("[McpClient] Calling tool: {}", name));

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(McpError::NotConnected)?;
        client
            .call_tool(params)
            .await
            .map_err(|e| McpError::ToolCallFailed(e.to_string()))
    }

    /// Get server info
    pub async fn server_info(&self) -> Option<Implementation> {
        let guard = self.client.read().await;
        guard
            .as_ref()
            .and_then(|client| client.peer_info().map(|info| info.server_info.clone()))
    }
}

#[async_trait]
impl ToolHost for McpClient {
    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(McpError::NotConnected)?;
        let result = client
            .list_tools(Default::default())
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        self.logger.info(&format!(
            "[McpClient] Listed {} tools",
            result.tools.len()
        ));

        Ok(result.tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<Value> {
        let result = self.call_tool_raw(name, arguments).await?;
        Ok(raw_result_value(&result))
    }

    async fn list_resources(&self) -> McpResult<Vec<ResourceDescriptor>> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(McpError::NotConnected)?;
        let result = client
            .list_resources(Default::default())
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        self.logger.info(&format!(
            "[McpClient] Listed {} resources",
            result.resources.len()
        ));

        Ok(result
            .resources
            .into_iter()
            .map(ResourceDescriptor::from)
            .collect())
    }

    async fn read_resource(&self, uri: &str) -> McpResult<Value> {
        self.logger.debug(&format!("[McpClient] Reading resource: {}", uri));

        let params: ReadResourceRequestParams =
            serde_json::from_value(serde_json::json!({ "uri": uri }))
                .map_err(|e| McpError::Protocol(e.to_string()))?;

        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(McpError::NotConnected)?;
        let result = client
            .read_resource(params)
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        serde_json::to_value(&result).map_err(|e| McpError::Protocol(e.to_string()))
    }

    async fn close(&self) -> McpResult<()> {
        let service = self.client.write().await.take();
        if let Some(service) = service {
            self.logger.info("[McpClient] Closing connection");
            service
                .cancel()
                .await
                .map_err(|e| McpError::Protocol(e.to_string()))?;
        }
        Ok(())
    }
}

/// Opens [`McpClient`] sessions for a configured endpoint
pub struct McpConnector {
    endpoint: ToolHostEndpoint,
    logger: Arc<dyn Logger>,
}

impl McpConnector {
    pub fn new(endpoint: ToolHostEndpoint, logger: Arc<dyn Logger>) -> Self {
        Self { endpoint, logger }
    }

    pub fn endpoint(&self) -> &ToolHostEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl ToolHostConnector for McpConnector {
    fn describe(&self) -> String {
        self.endpoint.to_string()
    }

    async fn connect(&self) -> McpResult<Arc<dyn ToolHost>> {
        let client = McpClient::connect(&self.endpoint, Arc::clone(&self.logger)).await?;
        Ok(Arc::new(client))
    }
}
