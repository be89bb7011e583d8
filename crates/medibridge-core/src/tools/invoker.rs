//! Single tool invocation with a time limit

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{BridgeError, BridgeResult};
use crate::logging::Logger;
use crate::types::{ToolCall, ToolResult};

use super::registry::ToolRegistry;
use super::strategy::ToolExecutionStrategy;

/// Executes validated tool calls through a [`ToolExecutionStrategy`]
///
/// Unknown names and turn-fatal errors (the tool host became unreachable)
/// are reported as errors; every other failure after the name check comes
/// back as a failed [`ToolResult`].
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    strategy: Arc<dyn ToolExecutionStrategy>,
    logger: Arc<dyn Logger>,
}

impl ToolInvoker {
    pub fn new(
        registry: Arc<ToolRegistry>,
        strategy: Arc<dyn ToolExecutionStrategy>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            registry,
            strategy,
            logger,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Invoke a tool once, giving up after `timeout`
    pub async fn invoke(&self, name: &str, arguments: Value, timeout: Duration) -> BridgeResult<ToolResult> {
        if !self.registry.contains(name) {
            self.logger
                .warn(&format!("[ToolInvoker] Rejecting unknown tool: {}", name));
            return Err(BridgeError::UnknownTool(name.to_string()));
        }

        self.logger.info(&format!(
            "[ToolInvoker] Calling {} via {} strategy",
            name,
            self.strategy.name()
        ));

        let outcome = tokio::time::timeout(timeout, self.strategy.execute(name, arguments)).await;

        let result = match outcome {
            Err(_) => {
                let err = BridgeError::ToolTimeout {
                    tool: name.to_string(),
                    timeout,
                };
                self.logger.warn(&format!("[ToolInvoker] {}", err));
                ToolResult::timeout()
            }
            Ok(Err(err)) if err.is_turn_fatal() => {
                self.logger.error(&format!("[ToolInvoker] {} aborted: {}", name, err));
                return Err(err);
            }
            Ok(Err(err)) => {
                self.logger.warn(&format!("[ToolInvoker] {}", err));
                ToolResult::error(match err {
                    BridgeError::ToolExecutionError { message, .. } => message,
                    other => other.to_string(),
                })
            }
            Ok(Ok(result)) => result,
        };

        self.logger.debug(&format!(
            "[ToolInvoker] {} finished (ok: {})",
            name, result.ok
        ));
        Ok(result)
    }

    /// Invoke a parsed call
    pub async fn invoke_call(&self, call: &ToolCall, timeout: Duration) -> BridgeResult<ToolResult> {
        self.invoke(&call.name, call.arguments_value(), timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ToolHost;
    use crate::connection::ConnectionSupervisor;
    use crate::logging::NoOpLogger;
    use crate::mcp::{StubConnector, StubReply, StubToolHost, ToolHostConnector};
    use crate::tools::InProcessStrategy;
    use serde_json::json;
    use std::time::Instant;

    async fn invoker_for(host: Arc<StubToolHost>) -> ToolInvoker {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let connector: Arc<dyn ToolHostConnector> = Arc::new(StubConnector::new(host));
        let supervisor = Arc::new(ConnectionSupervisor::new(connector, Arc::clone(&logger)));
        let registry = Arc::new(ToolRegistry::new(Arc::clone(&supervisor), Arc::clone(&logger)));
        registry.refresh().await.unwrap();
        let strategy = Arc::new(InProcessStrategy::new(supervisor, Arc::clone(&logger)));
        ToolInvoker::new(registry, strategy, logger)
    }

    #[tokio::test]
    async fn test_unknown_tool_never_reaches_host() {
        let host = Arc::new(StubToolHost::with_tool_names(["search_medicines"]));
        let invoker = invoker_for(Arc::clone(&host)).await;

        let err = invoker
            .invoke("delete_inventory", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::UnknownTool(ref name) if name == "delete_inventory"));
        assert_eq!(host.call_count(), 0);
    }

    #[tokio::test]
    async fn test_timeout_is_bounded() {
        let host = Arc::new(StubToolHost::with_tool_names(["get_medicine_stock"]).with_reply(
            "get_medicine_stock",
            StubReply::Delayed(Duration::from_secs(10), json!({"stock": 1})),
        ));
        let invoker = invoker_for(host).await;

        let timeout = Duration::from_millis(100);
        let started = Instant::now();
        let result = invoker
            .invoke("get_medicine_stock", json!({}), timeout)
            .await
            .unwrap();

        assert_eq!(result, ToolResult::timeout());
        assert!(started.elapsed() < timeout + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_execution_failure_becomes_error_result() {
        let host = Arc::new(
            StubToolHost::with_tool_names(["get_medicine_stock"])
                .with_reply("get_medicine_stock", StubReply::Fail("inventory locked".into())),
        );
        let invoker = invoker_for(Arc::clone(&host)).await;

        let result = invoker
            .invoke("get_medicine_stock", json!({}), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(!result.ok);
        assert!(result.error_message.unwrap().contains("inventory locked"));
        assert_eq!(host.call_count(), 1);
    }

    #[tokio::test]
    async fn test_lost_host_is_an_error() {
        let host = Arc::new(StubToolHost::with_tool_names(["get_medicine_stock"]));
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let connector = Arc::new(StubConnector::new(Arc::clone(&host)));
        let supervisor = Arc::new(ConnectionSupervisor::new(
            Arc::clone(&connector) as Arc<dyn ToolHostConnector>,
            Arc::clone(&logger),
        ));
        let registry = Arc::new(ToolRegistry::new(Arc::clone(&supervisor), Arc::clone(&logger)));
        registry.refresh().await.unwrap();
        let strategy = Arc::new(InProcessStrategy::new(Arc::clone(&supervisor), Arc::clone(&logger)));
        let invoker = ToolInvoker::new(registry, strategy, logger);

        host.close().await.unwrap();
        connector.set_refuse(true);

        let err = invoker
            .invoke("get_medicine_stock", json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, BridgeError::HostUnavailable(_)));
        assert!(!supervisor.is_connected().await);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_isolated_runner_is_killed_on_timeout() {
        use crate::tools::IsolatedProcessStrategy;

        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let host = Arc::new(StubToolHost::with_tool_names(["get_medicine_stock"]));
        let connector: Arc<dyn ToolHostConnector> = Arc::new(StubConnector::new(host));
        let supervisor = Arc::new(ConnectionSupervisor::new(connector, Arc::clone(&logger)));
        let registry = Arc::new(ToolRegistry::new(supervisor, Arc::clone(&logger)));
        registry.refresh().await.unwrap();

        let pid_file = tempfile::NamedTempFile::new().unwrap();
        let script = format!("echo $$ > {}; exec sleep 5", pid_file.path().display());
        let strategy = Arc::new(IsolatedProcessStrategy::new(
            "sh",
            vec!["-c".to_string(), script, "runner".to_string()],
            Arc::clone(&logger),
        ));
        let invoker = ToolInvoker::new(registry, strategy, logger);

        let timeout = Duration::from_millis(300);
        let started = Instant::now();
        let result = invoker
            .invoke("get_medicine_stock", json!({}), timeout)
            .await
            .unwrap();

        assert_eq!(result, ToolResult::timeout());
        assert!(started.elapsed() < timeout + Duration::from_secs(1));

        let pid = std::fs::read_to_string(pid_file.path()).unwrap();
        let pid = pid.trim();
        assert!(!pid.is_empty());

        // The killed child must be gone (reaped or at worst a zombie)
        let mut alive = true;
        for _ in 0..50 {
            let status = std::fs::read_to_string(format!("/proc/{}/stat", pid));
            alive = match status {
                Ok(stat) => !stat
                    .rsplit(')')
                    .next()
                    .map(|rest| rest.trim_start().starts_with('Z'))
                    .unwrap_or(false),
                Err(_) => false,
            };
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive, "runner process {} outlived its timeout", pid);
    }

    #[tokio::test]
    async fn test_invoke_call() {
        let host = Arc::new(StubToolHost::with_tool_names(["search_medicines"]));
        let invoker = invoker_for(Arc::clone(&host)).await;

        let call = ToolCall::from_value("search_medicines", json!({"query": "amoxicilina"}));
        let result = invoker.invoke_call(&call, Duration::from_secs(1)).await.unwrap();

        assert!(result.ok);
        assert_eq!(result.content, json!({"query": "amoxicilina"}));
        assert_eq!(host.calls()[0].1, json!({"query": "amoxicilina"}));
    }
}
