//! Console logger implementation

use super::traits::Logger;

/// A logger that outputs to stderr
///
/// Everything goes to stderr so stdout stays free for the tool runner's
/// JSON data channel.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    prefix: String,
    debug_enabled: bool,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleLogger {
    /// Create a new console logger with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "[MediBridge]".to_string(),
            debug_enabled: false,
        }
    }

    /// Create a console logger with a custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            debug_enabled: false,
        }
    }

    /// Also print debug lines
    pub fn verbose(mut self) -> Self {
        self.debug_enabled = true;
        self
    }
}

impl Logger for ConsoleLogger {
    fn debug(&self, message: &str) {
        if self.debug_enabled {
            eprintln!("{} DEBUG: {}", self.prefix, message);
        }
    }

    fn info(&self, message: &str) {
        eprintln!("{} INFO: {}", self.prefix, message);
    }

    fn warn(&self, message: &str) {
        eprintln!("{} WARN: {}", self.prefix, message);
    }

    fn error(&self, message: &str) {
        eprintln!("{} ERROR: {}", self.prefix, message);
    }
}
