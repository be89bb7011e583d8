//! Turn orchestration
//!
//! ```text
//!  caller ──respond()──► worker task
//!    ▲                      │ ensure_connected / ensure_fresh
//!    │                      │ Provider::stream_chat
//!    │                      │ ToolCallExtractor (text mode)
//!    │                      │ ToolInvoker, one call at a time
//!    │                      ▼
//!  TurnStream ◄── mpsc (bounded) ── EventSink
//! ```
//!
//! The caller reads with a per-event timeout; dropping the [`TurnStream`]
//! cancels the worker at its next checkpoint.

mod prompt;
mod state;
mod stream;
mod turn;

pub use prompt::{build_system_prompt, tool_result_message, DEFAULT_SYSTEM_PROMPT};
pub use state::TurnState;
pub use stream::TurnStream;
pub use turn::ResponseOrchestrator;
