//! Logging abstractions
//!
//! Components never talk to a global logger; each one receives an
//! `Arc<dyn Logger>` at construction time.

mod traits;
mod noop;
mod console;
mod memory;

pub use traits::{Logger, SharedLogger};
pub use noop::NoOpLogger;
pub use console::ConsoleLogger;
pub use memory::MemoryLogger;
