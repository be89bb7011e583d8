//! Tool catalog and execution
//!
//! ```text
//! ┌──────────────┐  contains()  ┌──────────────┐  execute()  ┌────────────────────────┐
//! │ ToolInvoker  │ ───────────▶ │ ToolRegistry │             │ ToolExecutionStrategy  │
//! │              │ ─────────────────────────────────────────▶│  - InProcess           │
//! └──────────────┘              └──────┬───────┘             │  - IsolatedProcess     │
//!                                      │ list_tools()        └───────────┬────────────┘
//!                                      ▼                                 │ call_tool()
//!                          ┌───────────────────────┐                     │
//!                          │ ConnectionSupervisor  │◀────────────────────┘
//!                          └───────────────────────┘
//! ```

mod registry;
mod normalize;
mod strategy;
mod invoker;

pub use registry::ToolRegistry;
pub use normalize::{content_text, normalize_result};
pub use strategy::{
    create_strategy, InProcessStrategy, IsolatedProcessStrategy, ToolExecutionStrategy,
};
pub use invoker::ToolInvoker;
