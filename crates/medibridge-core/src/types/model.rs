//! Model capability types

use serde::{Deserialize, Serialize};

/// Model capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    /// Whether the model supports tool/function calling
    #[serde(default)]
    pub tool_calling: bool,
    /// Whether the model streams its output
    #[serde(default)]
    pub streaming: bool,
}

impl ModelCapabilities {
    /// Create capabilities with all features enabled
    pub fn full() -> Self {
        Self {
            tool_calling: true,
            streaming: true,
        }
    }

    /// Create capabilities with just streaming
    pub fn streaming_only() -> Self {
        Self {
            streaming: true,
            ..Default::default()
        }
    }
}
