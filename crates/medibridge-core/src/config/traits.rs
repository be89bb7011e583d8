//! Configuration provider trait

use async_trait::async_trait;

use super::settings::ConfigLayer;

/// A source of configuration values
///
/// Implementations:
/// - `MemoryConfigProvider`: In-memory for testing and embedding
/// - `FileConfigProvider`: YAML file (~/.config/medibridge/config.yaml)
/// - `EnvConfigProvider`: `MEDIBRIDGE_*` and legacy environment variables
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    /// Load the values this source contributes
    async fn load(&self) -> ConfigResult<ConfigLayer>;
}

/// Errors that can occur during configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Other(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
