//! Configuration
//!
//! Sources are layered: defaults, then each provider in order, later sources
//! overriding earlier ones.
//!
//! ```rust,ignore
//! let config = resolve_config(&[
//!     &FileConfigProvider::user(),
//!     &EnvConfigProvider::new(),
//! ]).await?;
//! ```

mod traits;
mod settings;
mod memory;
mod file;
mod env;

pub use traits::{ConfigProvider, ConfigError, ConfigResult};
pub use settings::{
    BridgeConfig, ConfigLayer, ExecutionConfig, ToolCallMode, ToolHostEndpoint,
    DEFAULT_MODEL, DEFAULT_TOOL_HOST_URL,
};
pub use memory::MemoryConfigProvider;
pub use file::FileConfigProvider;
pub use env::EnvConfigProvider;

/// Resolve the effective configuration from layered sources
pub async fn resolve_config(sources: &[&dyn ConfigProvider]) -> ConfigResult<BridgeConfig> {
    let mut config = BridgeConfig::default();
    for source in sources {
        let layer = source.load().await.map_err(|e| match e {
            ConfigError::Other(message) => {
                ConfigError::Other(format!("{}: {}", source.name(), message))
            }
            other => other,
        })?;
        config.apply(layer);
    }
    config.validate()?;
    Ok(config)
}

/// Resolve from the user config file and the process environment
pub async fn load_default_config() -> ConfigResult<BridgeConfig> {
    let file = FileConfigProvider::user();
    let env = EnvConfigProvider::new();
    resolve_config(&[&file, &env]).await
}
