//! Bridge error taxonomy
//!
//! Per-call failures (`UnknownTool`, `ArgumentParseError`, `ToolTimeout`,
//! `ToolExecutionError`) stay local to one tool call. `HostUnavailable` and
//! `ModelApiError` end the turn. `StreamTimeout` is raised on the caller side
//! when no event arrives in time.

use std::time::Duration;

use thiserror::Error;

use crate::mcp::McpError;
use crate::providers::ProviderError;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool {tool}: {message}")]
    ArgumentParseError { tool: String, message: String },

    #[error("Tool host unavailable: {0}")]
    HostUnavailable(String),

    #[error("Tool {tool} timed out after {}ms", .timeout.as_millis())]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("Tool {tool} failed: {message}")]
    ToolExecutionError { tool: String, message: String },

    #[error("Model API error: {0}")]
    ModelApiError(#[from] ProviderError),

    #[error("No event received within {}ms", .0.as_millis())]
    StreamTimeout(Duration),
}

impl BridgeError {
    pub fn host_unavailable(err: impl std::fmt::Display) -> Self {
        Self::HostUnavailable(err.to_string())
    }

    /// Whether this error ends the whole turn rather than a single tool call
    pub fn is_turn_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::HostUnavailable(_)
                | BridgeError::ModelApiError(_)
                | BridgeError::StreamTimeout(_)
        )
    }
}

impl From<McpError> for BridgeError {
    fn from(err: McpError) -> Self {
        BridgeError::HostUnavailable(err.to_string())
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
