//! In-memory configuration provider

use async_trait::async_trait;
use parking_lot::RwLock;

use super::settings::ConfigLayer;
use super::traits::{ConfigProvider, ConfigResult};

/// In-memory configuration provider for testing and embedding
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    layer: RwLock<ConfigLayer>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_layer(layer: ConfigLayer) -> Self {
        Self {
            layer: RwLock::new(layer),
        }
    }

    /// Replace the stored values
    pub fn set_layer(&self, layer: ConfigLayer) {
        *self.layer.write() = layer;
    }

    /// Clear all values
    pub fn clear(&self) {
        *self.layer.write() = ConfigLayer::default();
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> ConfigResult<ConfigLayer> {
        Ok(self.layer.read().clone())
    }
}
