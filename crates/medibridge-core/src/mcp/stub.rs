//! In-memory tool host for tests and local development

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::types::ToolDescriptor;

use super::client::{McpError, McpResult};
use super::host::{ResourceDescriptor, ToolHost, ToolHostConnector};

/// What the stub answers for one tool
#[derive(Debug, Clone)]
pub enum StubReply {
    /// Return this raw result
    Value(Value),
    /// Fail the call with a tool error
    Fail(String),
    /// Sleep, then return the result
    Delayed(Duration, Value),
}

impl StubReply {
    /// A result shaped like an MCP text content response
    pub fn text(text: impl Into<String>) -> Self {
        StubReply::Value(text_result(text.into()))
    }
}

fn text_result(text: String) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": false,
    })
}

/// A tool host backed by canned replies
///
/// Records every call and the order in which calls start and finish, so tests
/// can assert on sequencing. Tools without a configured reply echo their
/// arguments back as text.
#[derive(Debug, Default)]
pub struct StubToolHost {
    tools: Mutex<Vec<ToolDescriptor>>,
    replies: Mutex<HashMap<String, StubReply>>,
    calls: Mutex<Vec<(String, Value)>>,
    events: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    resources: Mutex<Vec<(ResourceDescriptor, Value)>>,
    failing_lists: AtomicUsize,
    list_delay: Mutex<Option<Duration>>,
    closed: AtomicBool,
}

impl StubToolHost {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools: Mutex::new(tools),
            ..Default::default()
        }
    }

    /// Host exposing tools with the given names and empty schemas
    pub fn with_tool_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            names
                .into_iter()
                .map(|name| ToolDescriptor::new(name, ""))
                .collect(),
        )
    }

    pub fn with_reply(self, name: impl Into<String>, reply: StubReply) -> Self {
        self.replies.lock().insert(name.into(), reply);
        self
    }

    /// Publish a text resource under `uri`
    pub fn with_resource(self, uri: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        let uri = uri.into();
        let contents = json!({
            "contents": [{ "uri": uri.clone(), "mimeType": "text/plain", "text": text.into() }],
        });
        let descriptor = ResourceDescriptor {
            uri,
            name: name.into(),
            description: None,
            mime_type: Some("text/plain".to_string()),
        };
        self.resources.lock().push((descriptor, contents));
        self
    }

    pub fn set_reply(&self, name: impl Into<String>, reply: StubReply) {
        self.replies.lock().insert(name.into(), reply);
    }

    pub fn set_tools(&self, tools: Vec<ToolDescriptor>) {
        *self.tools.lock() = tools;
    }

    /// Make the next `count` list requests fail with a connection error
    pub fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// Make every list request sleep first (a host that stopped answering)
    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Every call received, in order
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }

    /// `start:<tool>` / `end:<tool>` markers in the order they happened
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Highest number of calls that were running at the same time
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> McpResult<()> {
        if self.is_closed() {
            Err(McpError::NotConnected)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ToolHost for StubToolHost {
    async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        self.ensure_open()?;
        let delay = *self.list_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failing_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(McpError::ConnectionFailed("stub host dropped the session".to_string()));
        }
        Ok(self.tools.lock().clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<Value> {
        self.ensure_open()?;
        self.calls.lock().push((name.to_string(), arguments.clone()));
        self.events.lock().push(format!("start:{}", name));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let reply = self.replies.lock().get(name).cloned();
        let outcome = match reply {
            Some(StubReply::Value(value)) => Ok(value),
            Some(StubReply::Fail(message)) => Err(McpError::ToolCallFailed(message)),
            Some(StubReply::Delayed(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            None => Ok(text_result(arguments.to_string())),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().push(format!("end:{}", name));
        outcome
    }

    async fn list_resources(&self) -> McpResult<Vec<ResourceDescriptor>> {
        self.ensure_open()?;
        Ok(self
            .resources
            .lock()
            .iter()
            .map(|(descriptor, _)| descriptor.clone())
            .collect())
    }

    async fn read_resource(&self, uri: &str) -> McpResult<Value> {
        self.ensure_open()?;
        self.resources
            .lock()
            .iter()
            .find(|(descriptor, _)| descriptor.uri == uri)
            .map(|(_, contents)| contents.clone())
            .ok_or_else(|| McpError::Protocol(format!("Unknown resource: {}", uri)))
    }

    async fn close(&self) -> McpResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out the same [`StubToolHost`] on every connect
///
/// The host is reopened on each connect so counters survive reconnects.
#[derive(Debug)]
pub struct StubConnector {
    host: Arc<StubToolHost>,
    connects: AtomicUsize,
    refuse: AtomicBool,
}

impl StubConnector {
    pub fn new(host: Arc<StubToolHost>) -> Self {
        Self {
            host,
            connects: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
        }
    }

    pub fn host(&self) -> &Arc<StubToolHost> {
        &self.host
    }

    /// Make subsequent connects fail (or succeed again)
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolHostConnector for StubConnector {
    fn describe(&self) -> String {
        "stub://tool-host".to_string()
    }

    async fn connect(&self) -> McpResult<Arc<dyn ToolHost>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(McpError::ConnectionFailed("connection refused".to_string()));
        }
        self.host.reopen();
        Ok(Arc::clone(&self.host) as Arc<dyn ToolHost>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_reply_echoes_arguments() {
        let host = StubToolHost::with_tool_names(["search_medicines"]);
        let result = host
            .call_tool("search_medicines", json!({"query": "ibuprofeno"}))
            .await
            .unwrap();

        assert_eq!(result["content"][0]["text"], r#"{"query":"ibuprofeno"}"#);
        assert_eq!(host.call_count(), 1);
        assert_eq!(host.events(), vec!["start:search_medicines", "end:search_medicines"]);
    }

    #[tokio::test]
    async fn test_failing_lists_then_recovery() {
        let host = StubToolHost::with_tool_names(["get_medicine_stock"]);
        host.fail_next_lists(1);

        assert!(host.list_tools().await.is_err());
        assert_eq!(host.list_tools().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_host_rejects_calls_until_reconnect() {
        let host = Arc::new(StubToolHost::with_tool_names(["search_medicines"]));
        let connector = StubConnector::new(Arc::clone(&host));

        host.close().await.unwrap();
        assert!(matches!(
            host.call_tool("search_medicines", json!({})).await,
            Err(McpError::NotConnected)
        ));

        let session = connector.connect().await.unwrap();
        assert!(session.list_tools().await.is_ok());
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_resources() {
        let host = StubToolHost::default().with_resource(
            "inventory://pharmacies",
            "pharmacies",
            "Botica Central, Piura",
        );

        let resources = host.list_resources().await.unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "inventory://pharmacies");

        let contents = host.read_resource("inventory://pharmacies").await.unwrap();
        assert_eq!(contents["contents"][0]["text"], "Botica Central, Piura");
        assert!(host.read_resource("inventory://missing").await.is_err());
    }

    #[tokio::test]
    async fn test_refused_connect() {
        let connector = StubConnector::new(Arc::new(StubToolHost::default()));
        connector.set_refuse(true);
        assert!(connector.connect().await.is_err());
        assert_eq!(connector.connect_count(), 1);
    }
}
