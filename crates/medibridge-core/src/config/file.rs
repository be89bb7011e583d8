//! File-based configuration provider (YAML)
//!
//! The user-level file lives at `~/.config/medibridge/config.yaml` (platform
//! config dir). A missing file contributes nothing.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::settings::ConfigLayer;
use super::traits::{ConfigProvider, ConfigResult};

/// File-based configuration provider
///
/// # Example
///
/// ```no_run
/// use medibridge_core::config::FileConfigProvider;
///
/// let user_config = FileConfigProvider::user();
/// let explicit = FileConfigProvider::new("/etc/medibridge/config.yaml");
/// ```
pub struct FileConfigProvider {
    path: PathBuf,
    cache: RwLock<Option<ConfigLayer>>,
}

impl FileConfigProvider {
    /// Create a new file config provider for a specific path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    /// Create a user-level config provider (~/.config/medibridge/config.yaml)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        Self::new(config_dir.join("medibridge").join("config.yaml"))
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the config file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> ConfigResult<ConfigLayer> {
        if !self.path.exists() {
            return Ok(ConfigLayer::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(ConfigLayer::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write a layer to the file, creating parent directories
    pub fn save(&self, layer: &ConfigLayer) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(layer)?;
        fs::write(&self.path, content)?;

        *self.cache.write() = Some(layer.clone());
        Ok(())
    }

    /// Reload config from disk (invalidate cache)
    pub fn reload(&self) -> ConfigResult<ConfigLayer> {
        let layer = self.read()?;
        *self.cache.write() = Some(layer.clone());
        Ok(layer)
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .field("exists", &self.exists())
            .finish()
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self) -> ConfigResult<ConfigLayer> {
        if let Some(layer) = self.cache.read().as_ref() {
            return Ok(layer.clone());
        }
        self.reload()
    }
}
