//! Bridge facade: assembles every component from one configuration

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{BridgeConfig, ConfigResult};
use crate::connection::ConnectionSupervisor;
use crate::logging::Logger;
use crate::error::BridgeResult;
use crate::mcp::{McpConnector, ResourceDescriptor, ToolHostConnector};
use crate::orchestrator::ResponseOrchestrator;
use crate::providers::{create_provider, Provider, ProviderModelConfig};
use crate::session::ChatSession;
use crate::tools::{create_strategy, ToolInvoker, ToolRegistry};

/// Health report for the bridge and its tool host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub app: String,
    /// `ok` or `error`
    pub mcp: String,
    /// Names of the tools currently offered by the host
    pub tools: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_error: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.mcp == "ok"
    }
}

pub struct Bridge {
    config: BridgeConfig,
    supervisor: Arc<ConnectionSupervisor>,
    registry: Arc<ToolRegistry>,
    orchestrator: ResponseOrchestrator,
    next_session: AtomicU64,
    logger: Arc<dyn Logger>,
}

impl Bridge {
    /// Build the bridge for a real tool host and model API
    pub fn from_config(config: BridgeConfig, logger: Arc<dyn Logger>) -> ConfigResult<Self> {
        config.validate()?;

        let model = ProviderModelConfig {
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
        };
        let provider = create_provider(&model, Arc::clone(&logger));
        let connector: Arc<dyn ToolHostConnector> = Arc::new(McpConnector::new(
            config.tool_host.clone(),
            Arc::clone(&logger),
        ));

        Ok(Self::with_components(config, provider, connector, logger))
    }

    /// Build the bridge around an explicit provider and connector
    pub fn with_components(
        config: BridgeConfig,
        provider: Arc<dyn Provider>,
        connector: Arc<dyn ToolHostConnector>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let supervisor = Arc::new(
            ConnectionSupervisor::new(connector, Arc::clone(&logger))
                .with_probe_timeout(config.tool_timeout()),
        );
        let registry = Arc::new(ToolRegistry::new(Arc::clone(&supervisor), Arc::clone(&logger)));
        let strategy = create_strategy(&config.execution, Arc::clone(&supervisor), Arc::clone(&logger));
        let invoker = Arc::new(ToolInvoker::new(
            Arc::clone(&registry),
            strategy,
            Arc::clone(&logger),
        ));
        let orchestrator = ResponseOrchestrator::new(
            provider,
            Arc::clone(&supervisor),
            invoker,
            config.clone(),
            Arc::clone(&logger),
        );

        logger.info(&format!(
            "[Bridge] Ready: model={}, tool host={}, mode={:?}",
            config.model, config.tool_host, config.tool_call_mode
        ));

        Self {
            config,
            supervisor,
            registry,
            orchestrator,
            next_session: AtomicU64::new(1),
            logger,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    pub fn orchestrator(&self) -> &ResponseOrchestrator {
        &self.orchestrator
    }

    /// Open a new, empty conversation
    pub fn session(&self) -> ChatSession {
        let id = format!("session-{}", self.next_session.fetch_add(1, Ordering::SeqCst));
        ChatSession::new(id, self.orchestrator.clone(), Arc::clone(&self.logger))
    }

    /// Check the tool host (reconnecting once if needed) and list its tools
    pub async fn health(&self) -> HealthStatus {
        let checked = match self.supervisor.health_check().await {
            Ok(_) => self.registry.refresh().await,
            Err(e) => Err(e),
        };

        match checked {
            Ok(()) => HealthStatus {
                app: "ok".to_string(),
                mcp: "ok".to_string(),
                tools: self.registry.names(),
                mcp_error: None,
            },
            Err(e) => {
                self.logger
                    .warn(&format!("[Bridge] Health check failed: {}", e));
                HealthStatus {
                    app: "ok".to_string(),
                    mcp: "error".to_string(),
                    tools: Vec::new(),
                    mcp_error: Some(e.to_string()),
                }
            }
        }
    }

    /// Resources published by the tool host
    pub async fn resources(&self) -> BridgeResult<Vec<ResourceDescriptor>> {
        self.supervisor.list_resources().await
    }

    /// Close the tool host connection
    pub async fn shutdown(&self) {
        self.logger.info("[Bridge] Shutting down");
        self.supervisor.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolHostEndpoint;
    use crate::logging::NoOpLogger;
    use crate::mcp::{StubConnector, StubToolHost};
    use crate::providers::MockProvider;

    fn bridge(host: Arc<StubToolHost>) -> (Arc<StubConnector>, Bridge) {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let connector = Arc::new(StubConnector::new(host));
        let bridge = Bridge::with_components(
            BridgeConfig::default(),
            Arc::new(MockProvider::echo(Arc::clone(&logger))),
            Arc::clone(&connector) as Arc<dyn ToolHostConnector>,
            logger,
        );
        (connector, bridge)
    }

    #[tokio::test]
    async fn test_health_lists_tools() {
        let host = Arc::new(StubToolHost::with_tool_names([
            "search_medicines",
            "get_medicine_stock",
        ]));
        let (_, bridge) = bridge(host);

        let status = bridge.health().await;

        assert!(status.is_healthy());
        assert_eq!(status.tools, vec!["search_medicines", "get_medicine_stock"]);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["app"], "ok");
        assert!(json.get("mcp_error").is_none());
    }

    #[tokio::test]
    async fn test_health_reports_host_error() {
        let (connector, bridge) = bridge(Arc::new(StubToolHost::with_tool_names(["search_medicines"])));
        connector.set_refuse(true);

        let status = bridge.health().await;

        assert_eq!(status.mcp, "error");
        assert!(status.tools.is_empty());
        assert!(status.mcp_error.unwrap().starts_with("Tool host unavailable"));
    }

    #[tokio::test]
    async fn test_shutdown_closes_host() {
        let host = Arc::new(StubToolHost::with_tool_names(["search_medicines"]));
        let (_, bridge) = bridge(Arc::clone(&host));

        bridge.health().await;
        bridge.shutdown().await;

        assert!(host.is_closed());
        assert!(!bridge.supervisor().is_connected().await);
    }

    #[tokio::test]
    async fn test_resources_listed_from_host() {
        let host = Arc::new(StubToolHost::default().with_resource(
            "inventory://pharmacies",
            "pharmacies",
            "Botica Central",
        ));
        let (_, bridge) = bridge(host);

        let resources = bridge.resources().await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "inventory://pharmacies");
    }

    #[tokio::test]
    async fn test_sessions_get_distinct_ids() {
        let (_, bridge) = bridge(Arc::new(StubToolHost::default()));
        assert_ne!(bridge.session().id(), bridge.session().id());
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid() {
        let config = BridgeConfig {
            tool_host: ToolHostEndpoint::Unix {
                path: "/tmp/medifinder.sock".into(),
            },
            channel_capacity: 0,
            ..Default::default()
        };
        assert!(Bridge::from_config(config, Arc::new(NoOpLogger)).is_err());
    }
}
