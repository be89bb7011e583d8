//! ResponseOrchestrator - drives one turn from user message to `end`

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;

use crate::config::{BridgeConfig, ToolCallMode};
use crate::connection::ConnectionSupervisor;
use crate::error::BridgeError;
use crate::extractor::ToolCallExtractor;
use crate::logging::Logger;
use crate::providers::{Provider, ProviderError, ProviderModelConfig, StreamChatOptions};
use crate::tools::{ToolInvoker, ToolRegistry};
use crate::types::{CancellationToken, ChatMessage, StreamChunk, StreamEvent, ToolCall, ToolResult};

use super::prompt::{
    build_system_prompt, compose_answer, tool_result_block, tool_result_message,
    DEFAULT_SYSTEM_PROMPT,
};
use super::state::TurnState;
use super::stream::{Cancelled, EventSink, TurnStream};

/// Why a turn stopped before `complete`
enum TurnFailure {
    Cancelled,
    Failed(BridgeError),
}

impl From<Cancelled> for TurnFailure {
    fn from(_: Cancelled) -> Self {
        TurnFailure::Cancelled
    }
}

impl From<BridgeError> for TurnFailure {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::ModelApiError(ProviderError::Cancelled) => TurnFailure::Cancelled,
            other => TurnFailure::Failed(other),
        }
    }
}

impl From<ProviderError> for TurnFailure {
    fn from(err: ProviderError) -> Self {
        BridgeError::from(err).into()
    }
}

type TurnOutcome<T> = Result<T, TurnFailure>;

/// How model text reaches the caller while it is generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiveEcho {
    Off,
    Chunk,
    FollowUp,
}

impl LiveEcho {
    fn event(self, text: String) -> Option<StreamEvent> {
        match self {
            LiveEcho::Off => None,
            LiveEcho::Chunk => Some(StreamEvent::chunk(text)),
            LiveEcho::FollowUp => Some(StreamEvent::follow_up(text)),
        }
    }
}

/// One complete model reply
#[derive(Debug, Default)]
struct ModelReply {
    text: String,
    /// Structured calls, in the order the model produced them
    calls: Vec<ToolCall>,
}

/// What the turn does with a reply: the text the user sees and the calls to run
struct ResolvedReply {
    display: String,
    calls: Vec<ToolCall>,
}

/// Tracks and logs state transitions
struct TurnTracker {
    state: TurnState,
    logger: Arc<dyn Logger>,
}

impl TurnTracker {
    fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            state: TurnState::Idle,
            logger,
        }
    }

    fn advance(&mut self, next: TurnState) {
        if !self.state.can_transition_to(&next) {
            self.logger.warn(&format!(
                "[ResponseOrchestrator] Unexpected transition {} -> {}",
                self.state, next
            ));
        } else {
            self.logger.debug(&format!(
                "[ResponseOrchestrator] {} -> {}",
                self.state, next
            ));
        }
        self.state = next;
    }
}

/// Runs turns: model generation, tool rounds, and the composed answer
///
/// Each call to [`respond`](Self::respond) spawns a worker task and returns
/// the caller's end of a bounded event channel. Every turn finishes with an
/// `end` event, including when the model, the tool host, or the worker
/// itself fails.
#[derive(Clone)]
pub struct ResponseOrchestrator {
    provider: Arc<dyn Provider>,
    supervisor: Arc<ConnectionSupervisor>,
    invoker: Arc<ToolInvoker>,
    extractor: Arc<ToolCallExtractor>,
    config: Arc<BridgeConfig>,
    logger: Arc<dyn Logger>,
}

impl ResponseOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        supervisor: Arc<ConnectionSupervisor>,
        invoker: Arc<ToolInvoker>,
        config: BridgeConfig,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            provider,
            supervisor,
            invoker,
            extractor: Arc::new(ToolCallExtractor::new(Arc::clone(&logger))),
            config: Arc::new(config),
            logger,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn registry(&self) -> &Arc<ToolRegistry> {
        self.invoker.registry()
    }

    /// Structured mode needs a provider with tool calling; otherwise use text
    fn tool_call_mode(&self) -> ToolCallMode {
        match self.config.tool_call_mode {
            ToolCallMode::Structured if !self.provider.capabilities().tool_calling => {
                ToolCallMode::Text
            }
            mode => mode,
        }
    }

    /// Start a turn for `user_message` on top of `history`
    ///
    /// Must be called from within a tokio runtime.
    pub fn respond(&self, history: Vec<ChatMessage>, user_message: impl Into<String>) -> TurnStream {
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let sink = EventSink::new(sender, cancel.clone());

        let worker = self.clone();
        let user_message = user_message.into();
        tokio::spawn(async move { worker.run(history, user_message, sink).await });

        TurnStream::new(receiver, cancel, self.config.stream_read_timeout())
    }

    async fn run(self, history: Vec<ChatMessage>, user_message: String, sink: EventSink) {
        let mut tracker = TurnTracker::new(Arc::clone(&self.logger));

        let outcome = AssertUnwindSafe(self.drive(history, user_message, &sink, &mut tracker))
            .catch_unwind()
            .await;

        let message = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(TurnFailure::Cancelled)) => {
                self.logger.info("[ResponseOrchestrator] Turn cancelled");
                return;
            }
            Ok(Err(TurnFailure::Failed(err))) => {
                self.logger
                    .error(&format!("[ResponseOrchestrator] Turn failed: {}", err));
                Some(err.to_string())
            }
            Err(panic) => {
                let message = format!("internal error: {}", panic_message(panic.as_ref()));
                self.logger
                    .error(&format!("[ResponseOrchestrator] Worker panicked: {}", message));
                Some(message)
            }
        };

        if let Some(message) = message {
            tracker.advance(TurnState::Errored {
                message: message.clone(),
            });
            if sink.emit(StreamEvent::error(message)).await.is_err() {
                return;
            }
        }
        // A cancelled caller synthesizes its own end
        let _ = sink.emit(StreamEvent::End).await;
    }

    async fn drive(
        &self,
        history: Vec<ChatMessage>,
        user_message: String,
        sink: &EventSink,
        tracker: &mut TurnTracker,
    ) -> TurnOutcome<()> {
        self.supervisor.ensure_connected().await?;
        self.registry().ensure_fresh().await?;
        sink.emit(StreamEvent::Start).await?;

        let structured = self.tool_call_mode() == ToolCallMode::Structured;
        let mut messages = self.initial_messages(history, user_message);

        tracker.advance(TurnState::ModelGenerating);
        let echo = if structured { LiveEcho::Chunk } else { LiveEcho::Off };
        let reply = self.generate(&messages, sink, echo).await?;
        let resolved = self.resolve(reply);
        if !structured && !resolved.display.is_empty() {
            sink.emit(StreamEvent::chunk(resolved.display.clone())).await?;
        }

        let max_rounds = self.config.max_tool_rounds.max(1);
        let mut answer = vec![resolved.display.clone()];
        let mut display = resolved.display;
        let mut pending = resolved.calls;
        let mut round = 0;

        while !pending.is_empty() {
            if round >= max_rounds {
                self.logger.warn(&format!(
                    "[ResponseOrchestrator] Tool round limit ({}) reached, skipping {} call(s)",
                    max_rounds,
                    pending.len()
                ));
                break;
            }
            round += 1;

            tracker.advance(TurnState::ToolsPending {
                calls: pending.clone(),
                round,
            });
            tracker.advance(TurnState::ToolExecuting { round });
            let results = self.execute_round(std::mem::take(&mut pending), sink).await?;

            if !display.is_empty() {
                messages.push(ChatMessage::assistant(display));
            }
            for (call, result) in &results {
                messages.push(ChatMessage::user(tool_result_message(call, result)));
                answer.push(tool_result_block(call, result));
            }

            tracker.advance(TurnState::ModelFollowUp { round });
            let echo = if structured { LiveEcho::FollowUp } else { LiveEcho::Off };
            let reply = self.generate(&messages, sink, echo).await?;
            let resolved = self.resolve(reply);
            if !structured && !resolved.display.is_empty() {
                sink.emit(StreamEvent::follow_up(resolved.display.clone())).await?;
            }

            answer.push(resolved.display.clone());
            display = resolved.display;
            pending = resolved.calls;
        }

        tracker.advance(TurnState::Complete);
        let content = compose_answer(answer.iter().map(String::as_str));
        sink.emit(StreamEvent::complete(content)).await?;
        Ok(())
    }

    fn initial_messages(&self, history: Vec<ChatMessage>, user_message: String) -> Vec<ChatMessage> {
        let base = self
            .config
            .system_prompt
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let system = build_system_prompt(base, &self.registry().list(), self.tool_call_mode());

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(history);
        messages.push(ChatMessage::user(user_message));
        messages
    }

    /// Run one model request to completion
    async fn generate(
        &self,
        messages: &[ChatMessage],
        sink: &EventSink,
        echo: LiveEcho,
    ) -> TurnOutcome<ModelReply> {
        sink.checkpoint()?;

        let model = ProviderModelConfig {
            model: self.config.model.clone(),
            api_key: self.config.api_key.clone(),
            api_base: self.config.api_base.clone(),
        };
        let mut options = StreamChatOptions::new()
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        if self.tool_call_mode() == ToolCallMode::Structured {
            let tools = self.registry().llm_tools();
            if !tools.is_empty() {
                options = options.with_tools(tools);
            }
        }

        let mut stream = self
            .provider
            .stream_chat(messages.to_vec(), model, options, sink.cancel_token().clone())
            .await?;

        let mut reply = ModelReply::default();
        while let Some(chunk) = stream.next().await {
            match chunk? {
                StreamChunk::Text { text } if text.is_empty() => {}
                StreamChunk::Text { text } => {
                    reply.text.push_str(&text);
                    if let Some(event) = echo.event(text) {
                        sink.emit(event).await?;
                    }
                }
                StreamChunk::ToolCall { tool_call } => reply.calls.push(tool_call),
            }
        }

        self.logger.debug(&format!(
            "[ResponseOrchestrator] Model replied with {} chars, {} structured call(s)",
            reply.text.len(),
            reply.calls.len()
        ));
        Ok(reply)
    }

    fn resolve(&self, reply: ModelReply) -> ResolvedReply {
        match self.tool_call_mode() {
            ToolCallMode::Structured => ResolvedReply {
                display: reply.text,
                calls: reply.calls,
            },
            ToolCallMode::Text => {
                let extraction = self.extractor.analyze(&reply.text, self.registry().as_ref());
                ResolvedReply {
                    display: extraction.display_text,
                    calls: extraction.calls,
                }
            }
        }
    }

    /// Execute one round of calls strictly in order
    async fn execute_round(
        &self,
        calls: Vec<ToolCall>,
        sink: &EventSink,
    ) -> TurnOutcome<Vec<(ToolCall, ToolResult)>> {
        let timeout = self.config.tool_timeout();
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            sink.emit(StreamEvent::tool_use(&call)).await?;

            let result = match self.invoker.invoke_call(&call, timeout).await {
                Ok(result) => result,
                Err(err) if err.is_turn_fatal() => return Err(err.into()),
                Err(err) => ToolResult::error(err.to_string()),
            };

            sink.emit(StreamEvent::tool_result(&call, result.clone())).await?;
            results.push((call, result));
        }

        Ok(results)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ToolHost;
    use crate::logging::{MemoryLogger, NoOpLogger};
    use crate::mcp::{StubConnector, StubReply, StubToolHost, ToolHostConnector};
    use crate::providers::{MockProvider, MockReply, ProviderResult, StreamResponse};
    use crate::tools::InProcessStrategy;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    const STOCK_CALL: &str =
        r#"Uso la herramienta get_medicine_stock con argumentos: {"medicine": "paracetamol"}."#;

    struct Harness {
        orchestrator: ResponseOrchestrator,
        provider: Arc<MockProvider>,
        host: Arc<StubToolHost>,
        connector: Arc<StubConnector>,
    }

    fn harness(replies: Vec<MockReply>, host: StubToolHost, config: BridgeConfig) -> Harness {
        let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
        let host = Arc::new(host);
        let connector = Arc::new(StubConnector::new(Arc::clone(&host)));
        let supervisor = Arc::new(ConnectionSupervisor::new(
            Arc::clone(&connector) as Arc<dyn ToolHostConnector>,
            Arc::clone(&logger),
        ));
        let registry = Arc::new(ToolRegistry::new(Arc::clone(&supervisor), Arc::clone(&logger)));
        let strategy = Arc::new(InProcessStrategy::new(Arc::clone(&supervisor), Arc::clone(&logger)));
        let invoker = Arc::new(ToolInvoker::new(registry, strategy, Arc::clone(&logger)));
        let provider = Arc::new(MockProvider::scripted(replies, Arc::clone(&logger)));

        let orchestrator = ResponseOrchestrator::new(
            Arc::clone(&provider) as Arc<dyn Provider>,
            supervisor,
            invoker,
            config,
            logger,
        );
        Harness {
            orchestrator,
            provider,
            host,
            connector,
        }
    }

    fn medicine_host() -> StubToolHost {
        StubToolHost::with_tool_names(["search_medicines", "get_medicine_stock"])
    }

    fn kinds(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::kind).collect()
    }

    #[tokio::test]
    async fn test_end_to_end_event_order() {
        let h = harness(
            vec![
                MockReply::text(STOCK_CALL),
                MockReply::text("Hay 120 unidades de paracetamol en Piura."),
            ],
            medicine_host().with_reply("get_medicine_stock", StubReply::text(r#"{"Piura": 120}"#)),
            BridgeConfig::default(),
        );

        let events = h
            .orchestrator
            .respond(vec![], "¿Hay paracetamol?")
            .collect()
            .await;

        assert_eq!(
            kinds(&events),
            vec!["start", "chunk", "tool_use", "tool_result", "follow_up", "complete", "end"]
        );
        assert_eq!(events[1], StreamEvent::chunk(STOCK_CALL));
        match &events[3] {
            StreamEvent::ToolResult { name, result, .. } => {
                assert_eq!(name, "get_medicine_stock");
                assert!(result.ok);
                assert_eq!(result.content, json!({"Piura": 120}));
            }
            other => panic!("expected tool_result, got {:?}", other),
        }
        match &events[4] {
            StreamEvent::FollowUp { content } => assert!(content.contains("Piura")),
            other => panic!("expected follow_up, got {:?}", other),
        }
        match &events[5] {
            StreamEvent::Complete { content } => {
                assert!(content.starts_with(STOCK_CALL));
                assert!(content.contains(r#"[get_medicine_stock] {"Piura":120}"#));
                assert!(content.ends_with("Hay 120 unidades de paracetamol en Piura."));
            }
            other => panic!("expected complete, got {:?}", other),
        }

        let calls = h.host.calls();
        assert_eq!(calls, vec![("get_medicine_stock".to_string(), json!({"medicine": "paracetamol"}))]);

        // Follow-up request carries the display text and the tool result
        let requests = h.provider.requests();
        assert_eq!(requests.len(), 2);
        let follow_up = &requests[1].messages;
        assert_eq!(follow_up[follow_up.len() - 2], ChatMessage::assistant(STOCK_CALL));
        assert!(follow_up[follow_up.len() - 1]
            .content
            .starts_with("Resultado de la herramienta get_medicine_stock"));
    }

    #[tokio::test]
    async fn test_medicine_locations_scenario() {
        let call = r#"Uso la herramienta get_medicine_locations con argumentos: {"medicine": "paracetamol"}."#;
        let h = harness(
            vec![
                MockReply::text(call),
                MockReply::text("Puedes encontrar paracetamol en Piura."),
            ],
            StubToolHost::with_tool_names(["get_medicine_locations"]).with_reply(
                "get_medicine_locations",
                StubReply::Value(json!({"content": [{"location": "Piura"}]})),
            ),
            BridgeConfig::default(),
        );

        let events = h
            .orchestrator
            .respond(vec![], "¿dónde hay paracetamol?")
            .collect()
            .await;

        assert_eq!(
            kinds(&events),
            vec!["start", "chunk", "tool_use", "tool_result", "follow_up", "complete", "end"]
        );
        let record: serde_json::Value = serde_json::from_str(&events[3].to_json_line()).unwrap();
        assert_eq!(record["type"], "tool_result");
        assert_eq!(record["name"], "get_medicine_locations");
        assert_eq!(record["result"], json!({"ok": true, "content": {"location": "Piura"}}));
        assert!(record["result"].to_string().contains("Piura"));
    }

    #[tokio::test]
    async fn test_lost_host_during_tool_call_ends_turn() {
        let h = harness(
            vec![MockReply::text(STOCK_CALL), MockReply::text("nunca")],
            medicine_host(),
            BridgeConfig::default(),
        );
        h.orchestrator.registry().ensure_fresh().await.unwrap();
        h.host.close().await.unwrap();
        h.connector.set_refuse(true);

        let events = h.orchestrator.respond(vec![], "paracetamol").collect().await;

        assert_eq!(kinds(&events), vec!["start", "chunk", "tool_use", "error", "end"]);
        match &events[3] {
            StreamEvent::Error { message } => assert!(message.starts_with("Tool host unavailable")),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(h.provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_plain_answer_without_tools() {
        let h = harness(
            vec![MockReply::text_chunks(["Solo puedo ayudar ", "con medicamentos."])],
            medicine_host(),
            BridgeConfig::default(),
        );

        let history = vec![
            ChatMessage::user("Hola"),
            ChatMessage::assistant("¡Hola! ¿En qué puedo ayudarte?"),
        ];
        let events = h.orchestrator.respond(history, "¿Qué hora es?").collect().await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Start,
                StreamEvent::chunk("Solo puedo ayudar con medicamentos."),
                StreamEvent::complete("Solo puedo ayudar con medicamentos."),
                StreamEvent::End,
            ]
        );

        let messages = &h.provider.requests()[0].messages;
        assert_eq!(messages.len(), 4);
        assert!(messages[0].content.contains("get_medicine_stock"));
        assert_eq!(messages[3], ChatMessage::user("¿Qué hora es?"));
    }

    #[tokio::test]
    async fn test_model_error_is_single_error_then_end() {
        let h = harness(
            vec![MockReply::Fail("overloaded".to_string())],
            medicine_host(),
            BridgeConfig::default(),
        );

        let events = h.orchestrator.respond(vec![], "Hola").collect().await;

        assert_eq!(kinds(&events), vec!["start", "error", "end"]);
        match &events[1] {
            StreamEvent::Error { message } => assert!(message.contains("overloaded")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_host_unavailable_ends_turn() {
        let h = harness(vec![MockReply::text("nunca")], medicine_host(), BridgeConfig::default());
        h.connector.set_refuse(true);

        let events = h.orchestrator.respond(vec![], "Hola").collect().await;

        assert_eq!(kinds(&events), vec!["error", "end"]);
        match &events[0] {
            StreamEvent::Error { message } => assert!(message.starts_with("Tool host unavailable")),
            other => panic!("expected error, got {:?}", other),
        }
        assert_eq!(h.provider.request_count(), 0);
    }

    #[tokio::test]
    async fn test_calls_run_sequentially_in_order() {
        let text = r#"Uso la herramienta search_medicines con argumentos: {"query": "amoxicilina"}. Uso la herramienta get_medicine_stock con argumentos: {"medicine": "amoxicilina"}."#;
        let host = medicine_host()
            .with_reply(
                "search_medicines",
                StubReply::Delayed(Duration::from_millis(40), json!("encontrado")),
            )
            .with_reply(
                "get_medicine_stock",
                StubReply::Delayed(Duration::from_millis(10), json!(35)),
            );
        let h = harness(
            vec![MockReply::text(text), MockReply::text("Listo.")],
            host,
            BridgeConfig::default(),
        );

        let events = h.orchestrator.respond(vec![], "amoxicilina").collect().await;

        let tool_events: Vec<(&str, String)> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolUse { name, .. } => Some(("use", name.clone())),
                StreamEvent::ToolResult { name, .. } => Some(("result", name.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            tool_events,
            vec![
                ("use", "search_medicines".to_string()),
                ("result", "search_medicines".to_string()),
                ("use", "get_medicine_stock".to_string()),
                ("result", "get_medicine_stock".to_string()),
            ]
        );
        assert_eq!(h.host.max_concurrent_calls(), 1);
        assert_eq!(
            h.host.events(),
            vec![
                "start:search_medicines",
                "end:search_medicines",
                "start:get_medicine_stock",
                "end:get_medicine_stock",
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_tool_becomes_error_result() {
        let h = harness(
            vec![MockReply::text(STOCK_CALL), MockReply::text("No pude consultar el stock.")],
            medicine_host().with_reply("get_medicine_stock", StubReply::Fail("db offline".to_string())),
            BridgeConfig::default(),
        );

        let events = h.orchestrator.respond(vec![], "paracetamol").collect().await;

        assert_eq!(
            kinds(&events),
            vec!["start", "chunk", "tool_use", "tool_result", "follow_up", "complete", "end"]
        );
        match &events[3] {
            StreamEvent::ToolResult { result, .. } => {
                assert!(!result.ok);
                assert!(result.error_message.as_deref().unwrap_or_default().contains("db offline"));
            }
            other => panic!("expected tool_result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_structured_mode_streams_and_offers_tools() {
        let call = ToolCall::from_value("search_medicines", json!({"query": "insulina"}));
        let h = harness(
            vec![
                MockReply::with_tool_calls("Consultando inventario.", vec![call.clone()]),
                MockReply::text_chunks(["Hay insulina ", "en Chiclayo."]),
            ],
            medicine_host(),
            BridgeConfig {
                tool_call_mode: ToolCallMode::Structured,
                ..Default::default()
            },
        );

        let events = h.orchestrator.respond(vec![], "insulina").collect().await;

        assert_eq!(
            kinds(&events),
            vec!["start", "chunk", "tool_use", "tool_result", "follow_up", "follow_up", "complete", "end"]
        );
        assert_eq!(events[2], StreamEvent::tool_use(&call));
        assert_eq!(events[4], StreamEvent::follow_up("Hay insulina "));

        let offered: Vec<String> = h.provider.requests()[0]
            .options
            .tools
            .as_ref()
            .map(|tools| tools.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default();
        assert_eq!(offered, vec!["search_medicines", "get_medicine_stock"]);
    }

    #[tokio::test]
    async fn test_structured_unknown_tool_is_never_executed() {
        let call = ToolCall::from_value("delete_inventory", json!({}));
        let h = harness(
            vec![
                MockReply::with_tool_calls("", vec![call]),
                MockReply::text("No existe esa herramienta."),
            ],
            medicine_host(),
            BridgeConfig {
                tool_call_mode: ToolCallMode::Structured,
                ..Default::default()
            },
        );

        let events = h.orchestrator.respond(vec![], "borra todo").collect().await;

        assert_eq!(h.host.call_count(), 0);
        let rejected = events.iter().any(|e| {
            matches!(e, StreamEvent::ToolResult { result, .. }
                if result.error_message.as_deref() == Some("Unknown tool: delete_inventory"))
        });
        assert!(rejected);
        assert_eq!(events.last(), Some(&StreamEvent::End));
    }

    #[tokio::test]
    async fn test_tool_rounds_are_bounded() {
        let h = harness(
            vec![
                MockReply::text(STOCK_CALL),
                MockReply::text(STOCK_CALL),
                MockReply::text(STOCK_CALL),
                MockReply::text("never requested"),
            ],
            medicine_host(),
            BridgeConfig {
                max_tool_rounds: 2,
                ..Default::default()
            },
        );

        let events = h.orchestrator.respond(vec![], "paracetamol").collect().await;

        assert_eq!(h.host.call_count(), 2);
        assert_eq!(h.provider.request_count(), 3);
        assert_eq!(kinds(&events).last(), Some(&"end"));
        assert_eq!(kinds(&events).iter().filter(|k| **k == "complete").count(), 1);
    }

    #[tokio::test]
    async fn test_stream_timeout_cancels_worker() {
        let h = harness(
            vec![MockReply::text(STOCK_CALL), MockReply::text("tarde")],
            medicine_host().with_reply(
                "get_medicine_stock",
                StubReply::Delayed(Duration::from_secs(2), json!(1)),
            ),
            BridgeConfig {
                stream_read_timeout_ms: 100,
                ..Default::default()
            },
        );

        let events = h.orchestrator.respond(vec![], "paracetamol").collect().await;

        assert_eq!(kinds(&events), vec!["start", "chunk", "tool_use", "error", "end"]);
        assert_eq!(events[3], StreamEvent::error("No event received within 100ms"));
    }

    struct PanickingProvider;

    #[async_trait]
    impl Provider for PanickingProvider {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn stream_chat(
            &self,
            _messages: Vec<ChatMessage>,
            _model: ProviderModelConfig,
            _options: StreamChatOptions,
            _cancel_token: CancellationToken,
        ) -> ProviderResult<StreamResponse> {
            panic!("provider exploded")
        }
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_error_and_end() {
        let logger = Arc::new(MemoryLogger::new());
        let h = harness(vec![], medicine_host(), BridgeConfig::default());
        let orchestrator = ResponseOrchestrator {
            provider: Arc::new(PanickingProvider),
            logger: Arc::clone(&logger) as Arc<dyn Logger>,
            ..h.orchestrator
        };

        let events = orchestrator.respond(vec![], "Hola").collect().await;

        assert_eq!(
            events,
            vec![
                StreamEvent::Start,
                StreamEvent::error("internal error: provider exploded"),
                StreamEvent::End,
            ]
        );
        assert!(logger.contains("Worker panicked"));
    }
}
