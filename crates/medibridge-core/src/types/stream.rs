//! Streaming types: model-side chunks and caller-side turn events

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::tool::{ToolCall, ToolResult};

/// Streaming chunk from a model response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamChunk {
    /// Text content chunk
    Text {
        text: String,
    },
    /// Complete structured tool call
    ToolCall {
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },
}

impl StreamChunk {
    /// Create a text chunk
    pub fn text(text: impl Into<String>) -> Self {
        StreamChunk::Text { text: text.into() }
    }

    /// Create a tool call chunk
    pub fn tool_call(tool_call: ToolCall) -> Self {
        StreamChunk::ToolCall { tool_call }
    }

    /// Get the text content if this is a text chunk
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StreamChunk::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Get the tool call if this is a tool call chunk
    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            StreamChunk::ToolCall { tool_call } => Some(tool_call),
            _ => None,
        }
    }
}

/// Event emitted to the caller during one turn
///
/// Serialized as one JSON record per event, `{"type": <variant>, ...}`.
/// A well-formed turn always finishes with [`StreamEvent::End`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Start,
    Chunk {
        content: String,
    },
    ToolUse {
        name: String,
        arguments: Map<String, Value>,
    },
    ToolResult {
        name: String,
        arguments: Map<String, Value>,
        result: ToolResult,
    },
    FollowUp {
        content: String,
    },
    Complete {
        content: String,
    },
    Error {
        message: String,
    },
    End,
}

impl StreamEvent {
    pub fn chunk(content: impl Into<String>) -> Self {
        StreamEvent::Chunk {
            content: content.into(),
        }
    }

    pub fn tool_use(call: &ToolCall) -> Self {
        StreamEvent::ToolUse {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        }
    }

    pub fn tool_result(call: &ToolCall, result: ToolResult) -> Self {
        StreamEvent::ToolResult {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
        }
    }

    pub fn follow_up(content: impl Into<String>) -> Self {
        StreamEvent::FollowUp {
            content: content.into(),
        }
    }

    pub fn complete(content: impl Into<String>) -> Self {
        StreamEvent::Complete {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// Wire name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Start => "start",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::ToolUse { .. } => "tool_use",
            StreamEvent::ToolResult { .. } => "tool_result",
            StreamEvent::FollowUp { .. } => "follow_up",
            StreamEvent::Complete { .. } => "complete",
            StreamEvent::Error { .. } => "error",
            StreamEvent::End => "end",
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, StreamEvent::End)
    }

    /// Serialize as a single line-delimited JSON record (newline included)
    pub fn to_json_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            // Only reachable if a tool result carried a non-string map key
            serde_json::json!({ "type": "error", "message": e.to_string() }).to_string()
        });
        line.push('\n');
        line
    }
}
