//! Tool catalog cache
//!
//! The ToolRegistry is the source of truth for which tool names are valid:
//! - Discovers tools from the host through the connection supervisor
//! - Answers name lookups for the extractor and the invoker
//! - Converts descriptors to model-facing tool definitions

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::connection::ConnectionSupervisor;
use crate::error::BridgeResult;
use crate::logging::Logger;
use crate::types::{Tool, ToolDescriptor};

/// One immutable snapshot of the host's tools
#[derive(Debug, Default)]
struct Catalog {
    tools: Vec<ToolDescriptor>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    fn build(listing: Vec<ToolDescriptor>, logger: &dyn Logger) -> Self {
        let mut catalog = Catalog::default();
        for tool in listing {
            if catalog.by_name.contains_key(&tool.name) {
                logger.warn(&format!(
                    "[ToolRegistry] Duplicate tool name '{}' in listing, keeping the first",
                    tool.name
                ));
                continue;
            }
            catalog.by_name.insert(tool.name.clone(), catalog.tools.len());
            catalog.tools.push(tool);
        }
        catalog
    }

    fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.by_name.get(name).map(|&index| &self.tools[index])
    }
}

/// Tool registry for the tools the host currently exposes
pub struct ToolRegistry {
    supervisor: Arc<ConnectionSupervisor>,
    /// Swapped whole on refresh; readers never see a partial set
    catalog: RwLock<Arc<Catalog>>,
    /// Connection generation the catalog was loaded from (0 = never loaded)
    loaded_generation: AtomicU64,
    logger: Arc<dyn Logger>,
}

impl ToolRegistry {
    pub fn new(supervisor: Arc<ConnectionSupervisor>, logger: Arc<dyn Logger>) -> Self {
        Self {
            supervisor,
            catalog: RwLock::new(Arc::new(Catalog::default())),
            loaded_generation: AtomicU64::new(0),
            logger,
        }
    }

    fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&*self.catalog.read())
    }

    /// Repopulate the catalog from the host
    ///
    /// On failure the previous catalog stays in place.
    pub async fn refresh(&self) -> BridgeResult<()> {
        let listing = match self.supervisor.list_tools().await {
            Ok(listing) => listing,
            Err(e) => {
                self.logger
                    .error(&format!("[ToolRegistry] Failed to fetch tools: {}", e));
                return Err(e);
            }
        };

        let catalog = Catalog::build(listing, self.logger.as_ref());
        self.logger.info(&format!(
            "[ToolRegistry] Discovered {} tools from tool host",
            catalog.tools.len()
        ));

        *self.catalog.write() = Arc::new(catalog);
        self.loaded_generation
            .store(self.supervisor.generation(), Ordering::SeqCst);
        Ok(())
    }

    /// Refresh when the catalog is empty or came from an older connection
    pub async fn ensure_fresh(&self) -> BridgeResult<()> {
        let stale = self.loaded_generation.load(Ordering::SeqCst) != self.supervisor.generation();
        if stale || self.snapshot().tools.is_empty() {
            self.refresh().await?;
        }
        Ok(())
    }

    /// All known tools, in host order
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.snapshot().tools.clone()
    }

    pub fn get(&self, name: &str) -> Option<ToolDescriptor> {
        self.snapshot().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().by_name.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot().tools.iter().map(|t| t.name.clone()).collect()
    }

    /// Tool definitions to offer the model
    pub fn llm_tools(&self) -> Vec<Tool> {
        self.snapshot().tools.iter().map(Tool::from).collect()
    }

    pub fn tool_count(&self) -> usize {
        self.snapshot().tools.len()
    }
}
