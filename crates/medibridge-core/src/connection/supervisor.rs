//! Owner of the single tool-host connection

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::{BridgeError, BridgeResult};
use crate::logging::Logger;
use crate::mcp::{ResourceDescriptor, ToolHost, ToolHostConnector};
use crate::types::ToolDescriptor;

/// Default budget for one health probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection state guarded by the supervisor
pub enum ConnectionState {
    Disconnected,
    Connected {
        host: Arc<dyn ToolHost>,
        generation: u64,
    },
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connected { generation, .. } => f
                .debug_struct("Connected")
                .field("generation", generation)
                .finish(),
        }
    }
}

/// A live host session together with the generation it belongs to
#[derive(Clone)]
pub struct HostSession {
    pub host: Arc<dyn ToolHost>,
    pub generation: u64,
}

/// Lazily connects to the tool host and reconnects when asked
///
/// Every state change happens under one async mutex, so at most one connect
/// is in flight and callers racing on a dead connection trigger a single
/// reconnect. Invalidation is keyed by generation: a caller holding a stale
/// session cannot close the one that replaced it.
pub struct ConnectionSupervisor {
    connector: Arc<dyn ToolHostConnector>,
    state: Mutex<ConnectionState>,
    generation: AtomicU64,
    probe_timeout: Duration,
    logger: Arc<dyn Logger>,
}

impl ConnectionSupervisor {
    pub fn new(connector: Arc<dyn ToolHostConnector>, logger: Arc<dyn Logger>) -> Self {
        Self {
            connector,
            state: Mutex::new(ConnectionState::Disconnected),
            generation: AtomicU64::new(0),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            logger,
        }
    }

    /// Bound each `list_tools` probe made by [`health_check`](Self::health_check)
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Generation of the current (or most recent) connection; 0 before the first
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, ConnectionState::Connected { .. })
    }

    /// Return the live session and its generation, connecting first if needed
    pub async fn session(&self) -> BridgeResult<HostSession> {
        let mut state = self.state.lock().await;
        if let ConnectionState::Connected { host, generation } = &*state {
            return Ok(HostSession {
                host: Arc::clone(host),
                generation: *generation,
            });
        }
        self.connect_locked(&mut state).await
    }

    /// Return the live host, connecting first if needed
    pub async fn ensure_connected(&self) -> BridgeResult<Arc<dyn ToolHost>> {
        Ok(self.session().await?.host)
    }

    /// List tools over the current session
    ///
    /// A connection-level failure invalidates the session before the error
    /// is returned.
    pub async fn list_tools(&self) -> BridgeResult<Vec<ToolDescriptor>> {
        let session = self.session().await?;
        match session.host.list_tools().await {
            Ok(tools) => Ok(tools),
            Err(e) => {
                if e.is_connection_error() {
                    self.invalidate(session.generation).await;
                }
                Err(BridgeError::host_unavailable(e))
            }
        }
    }

    /// Resources published by the host
    pub async fn list_resources(&self) -> BridgeResult<Vec<ResourceDescriptor>> {
        let session = self.session().await?;
        match session.host.list_resources().await {
            Ok(resources) => Ok(resources),
            Err(e) => {
                if e.is_connection_error() {
                    self.invalidate(session.generation).await;
                }
                Err(BridgeError::host_unavailable(e))
            }
        }
    }

    /// Raw contents of one resource
    pub async fn read_resource(&self, uri: &str) -> BridgeResult<serde_json::Value> {
        let session = self.session().await?;
        match session.host.read_resource(uri).await {
            Ok(contents) => Ok(contents),
            Err(e) => {
                if e.is_connection_error() {
                    self.invalidate(session.generation).await;
                }
                Err(BridgeError::host_unavailable(e))
            }
        }
    }

    /// Verify the host answers, reconnecting once if it does not
    ///
    /// Each probe is bounded by the probe timeout, so a hung host cannot hold
    /// the connection lock indefinitely.
    pub async fn health_check(&self) -> BridgeResult<bool> {
        let mut state = self.state.lock().await;

        let host = match &*state {
            ConnectionState::Connected { host, .. } => Arc::clone(host),
            ConnectionState::Disconnected => self.connect_locked(&mut state).await?.host,
        };

        match self.probe(host.as_ref()).await {
            Ok(()) => return Ok(true),
            Err(message) => {
                self.logger.warn(&format!(
                    "[ConnectionSupervisor] Health check failed, reconnecting: {}",
                    message
                ));
            }
        }

        self.close_locked(&mut state).await;
        let host = self.connect_locked(&mut state).await?.host;

        match self.probe(host.as_ref()).await {
            Ok(()) => Ok(true),
            Err(message) => {
                self.logger.error(&format!(
                    "[ConnectionSupervisor] Host still unhealthy after reconnect: {}",
                    message
                ));
                self.close_locked(&mut state).await;
                Err(BridgeError::HostUnavailable(message))
            }
        }
    }

    async fn probe(&self, host: &dyn ToolHost) -> Result<(), String> {
        match tokio::time::timeout(self.probe_timeout, host.list_tools()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "no answer within {}ms",
                self.probe_timeout.as_millis()
            )),
        }
    }

    /// Drop the session of `generation` so the next use reconnects
    ///
    /// Does nothing when that session has already been replaced or closed.
    pub async fn invalidate(&self, generation: u64) {
        let mut state = self.state.lock().await;
        let current = match &*state {
            ConnectionState::Connected { generation, .. } => Some(*generation),
            ConnectionState::Disconnected => None,
        };

        if current == Some(generation) {
            self.logger.info(&format!(
                "[ConnectionSupervisor] Invalidating tool host connection (generation {})",
                generation
            ));
            self.close_locked(&mut state).await;
        } else {
            self.logger.debug(&format!(
                "[ConnectionSupervisor] Ignoring stale invalidation of generation {}",
                generation
            ));
        }
    }

    /// Close the connection (shutdown)
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        self.close_locked(&mut state).await;
    }

    async fn connect_locked(&self, state: &mut ConnectionState) -> BridgeResult<HostSession> {
        self.logger.info(&format!(
            "[ConnectionSupervisor] Connecting to tool host at {}",
            self.connector.describe()
        ));

        let host = self.connector.connect().await.map_err(|e| {
            self.logger
                .error(&format!("[ConnectionSupervisor] Connect failed: {}", e));
            BridgeError::host_unavailable(e)
        })?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.logger.debug(&format!(
            "[ConnectionSupervisor] Connected (generation {})",
            generation
        ));
        *state = ConnectionState::Connected {
            host: Arc::clone(&host),
            generation,
        };
        Ok(HostSession { host, generation })
    }

    async fn close_locked(&self, state: &mut ConnectionState) {
        let previous = std::mem::replace(state, ConnectionState::Disconnected);
        if let ConnectionState::Connected { host, generation } = previous {
            if let Err(e) = host.close().await {
                self.logger.warn(&format!(
                    "[ConnectionSupervisor] Error closing generation {}: {}",
                    generation, e
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::mcp::{StubConnector, StubToolHost};

    fn supervisor(host: StubToolHost) -> (Arc<StubConnector>, ConnectionSupervisor) {
        let connector = Arc::new(StubConnector::new(Arc::new(host)));
        let supervisor = ConnectionSupervisor::new(
            Arc::clone(&connector) as Arc<dyn ToolHostConnector>,
            Arc::new(NoOpLogger),
        );
        (connector, supervisor)
    }

    #[tokio::test]
    async fn test_lazy_and_idempotent_connect() {
        let (connector, supervisor) = supervisor(StubToolHost::with_tool_names(["search_medicines"]));

        assert!(!supervisor.is_connected().await);
        assert_eq!(connector.connect_count(), 0);

        supervisor.ensure_connected().await.unwrap();
        supervisor.ensure_connected().await.unwrap();

        assert!(supervisor.is_connected().await);
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(supervisor.generation(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_connect() {
        let (connector, supervisor) = supervisor(StubToolHost::default());
        let supervisor = Arc::new(supervisor);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let supervisor = Arc::clone(&supervisor);
                tokio::spawn(async move { supervisor.ensure_connected().await.is_ok() })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_health_check_reconnects_once() {
        let host = StubToolHost::with_tool_names(["get_medicine_stock"]);
        host.fail_next_lists(1);
        let (connector, supervisor) = supervisor(host);

        assert!(supervisor.health_check().await.unwrap());
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(supervisor.generation(), 2);
    }

    #[tokio::test]
    async fn test_health_check_gives_up_after_second_failure() {
        let host = StubToolHost::default();
        host.fail_next_lists(2);
        let (connector, supervisor) = supervisor(host);

        let err = supervisor.health_check().await.unwrap_err();
        assert!(matches!(err, BridgeError::HostUnavailable(_)));
        assert_eq!(connector.connect_count(), 2);
        assert!(!supervisor.is_connected().await);
    }

    #[tokio::test]
    async fn test_refused_connect_is_host_unavailable() {
        let (connector, supervisor) = supervisor(StubToolHost::default());
        connector.set_refuse(true);

        assert!(matches!(
            supervisor.ensure_connected().await,
            Err(BridgeError::HostUnavailable(_))
        ));
        assert_eq!(supervisor.generation(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reconnect() {
        let (connector, supervisor) = supervisor(StubToolHost::default());

        let session = supervisor.session().await.unwrap();
        supervisor.invalidate(session.generation).await;
        assert!(connector.host().is_closed());

        supervisor.ensure_connected().await.unwrap();
        assert_eq!(connector.connect_count(), 2);
        assert_eq!(supervisor.generation(), 2);
    }

    #[tokio::test]
    async fn test_resources_over_session() {
        let (_, supervisor) = supervisor(StubToolHost::default().with_resource(
            "inventory://regions",
            "regions",
            "Piura, Lambayeque",
        ));

        let resources = supervisor.list_resources().await.unwrap();
        assert_eq!(resources[0].name, "regions");
        let contents = supervisor.read_resource("inventory://regions").await.unwrap();
        assert_eq!(contents["contents"][0]["text"], "Piura, Lambayeque");
        assert!(supervisor.is_connected().await);
    }

    #[tokio::test]
    async fn test_close() {
        let (connector, supervisor) = supervisor(StubToolHost::default());
        supervisor.ensure_connected().await.unwrap();
        supervisor.close().await;

        assert!(!supervisor.is_connected().await);
        assert!(connector.host().is_closed());
    }

    /// Hands out a fresh host on every connect
    #[derive(Default)]
    struct FreshHostConnector {
        hosts: parking_lot::Mutex<Vec<Arc<StubToolHost>>>,
    }

    impl FreshHostConnector {
        fn host(&self, index: usize) -> Arc<StubToolHost> {
            Arc::clone(&self.hosts.lock()[index])
        }
    }

    #[async_trait::async_trait]
    impl ToolHostConnector for FreshHostConnector {
        fn describe(&self) -> String {
            "fresh://tool-host".to_string()
        }

        async fn connect(&self) -> crate::mcp::McpResult<Arc<dyn ToolHost>> {
            let host = Arc::new(StubToolHost::with_tool_names(["get_medicine_stock"]));
            self.hosts.lock().push(Arc::clone(&host));
            Ok(host as Arc<dyn ToolHost>)
        }
    }

    #[tokio::test]
    async fn test_stale_invalidate_keeps_newer_session() {
        let connector = Arc::new(FreshHostConnector::default());
        let supervisor = ConnectionSupervisor::new(
            Arc::clone(&connector) as Arc<dyn ToolHostConnector>,
            Arc::new(NoOpLogger),
        );

        let first = supervisor.session().await.unwrap();
        supervisor.invalidate(first.generation).await;
        let second = supervisor.session().await.unwrap();
        assert_eq!(second.generation, 2);

        // A caller that failed on the first session reports it late
        supervisor.invalidate(first.generation).await;

        assert!(supervisor.is_connected().await);
        assert!(connector.host(0).is_closed());
        assert!(!connector.host(1).is_closed());
        let current = supervisor.session().await.unwrap();
        assert_eq!(current.generation, 2);
        assert!(current
            .host
            .call_tool("get_medicine_stock", serde_json::json!({}))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_health_check_probe_is_bounded() {
        let host = StubToolHost::default();
        host.set_list_delay(Duration::from_secs(5));
        let connector = Arc::new(StubConnector::new(Arc::new(host)));
        let supervisor = ConnectionSupervisor::new(
            Arc::clone(&connector) as Arc<dyn ToolHostConnector>,
            Arc::new(NoOpLogger),
        )
        .with_probe_timeout(Duration::from_millis(50));

        let started = std::time::Instant::now();
        let err = supervisor.health_check().await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(err.to_string().contains("no answer within 50ms"));
        assert!(!supervisor.is_connected().await);
        assert_eq!(connector.connect_count(), 2);
    }
}
