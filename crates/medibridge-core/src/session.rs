//! Chat sessions: one conversation history, one turn at a time

use std::sync::Arc;

use futures::{stream, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::logging::Logger;
use crate::orchestrator::{ResponseOrchestrator, TurnStream};
use crate::types::{ChatMessage, StreamEvent};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A turn is already running in this session")]
    Busy,

    #[error("Empty message")]
    EmptyMessage,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One conversation, kept in memory for the life of the session
///
/// The history is locked for the whole turn; a second `send` while a turn
/// is running fails with [`SessionError::Busy`] instead of waiting.
pub struct ChatSession {
    id: String,
    history: Arc<Mutex<Vec<ChatMessage>>>,
    orchestrator: ResponseOrchestrator,
    logger: Arc<dyn Logger>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, orchestrator: ResponseOrchestrator, logger: Arc<dyn Logger>) -> Self {
        Self {
            id: id.into(),
            history: Arc::new(Mutex::new(Vec::new())),
            orchestrator,
            logger,
        }
    }

    /// Start from an existing conversation
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = Arc::new(Mutex::new(history));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_busy(&self) -> bool {
        self.history.try_lock().is_err()
    }

    /// Start a turn
    ///
    /// The user message and the composed answer are appended to the history
    /// once the turn reaches `complete`; failed turns leave it untouched.
    pub fn send(&self, message: &str) -> SessionResult<SessionTurn> {
        let message = message.trim();
        if message.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let history = Arc::clone(&self.history).try_lock_owned().map_err(|_| {
            self.logger
                .warn(&format!("[ChatSession] {} rejected a concurrent turn", self.id));
            SessionError::Busy
        })?;

        self.logger.debug(&format!(
            "[ChatSession] {} starting turn ({} prior messages)",
            self.id,
            history.len()
        ));
        let stream = self.orchestrator.respond(history.clone(), message);

        Ok(SessionTurn {
            stream,
            history: Some(history),
            user_message: message.to_string(),
        })
    }

    /// Snapshot of the conversation
    pub fn history(&self) -> SessionResult<Vec<ChatMessage>> {
        self.history
            .try_lock()
            .map(|history| history.clone())
            .map_err(|_| SessionError::Busy)
    }

    /// Forget the conversation
    pub fn reset(&self) -> SessionResult<()> {
        let mut history = self.history.try_lock().map_err(|_| SessionError::Busy)?;
        history.clear();
        self.logger
            .info(&format!("[ChatSession] {} conversation reset", self.id));
        Ok(())
    }
}

/// A running turn that records its outcome in the session history
///
/// Holds the session lock until `end` is read or the turn is dropped.
pub struct SessionTurn {
    stream: TurnStream,
    history: Option<OwnedMutexGuard<Vec<ChatMessage>>>,
    user_message: String,
}

impl SessionTurn {
    pub async fn next(&mut self) -> Option<StreamEvent> {
        let event = self.stream.next().await;
        match &event {
            Some(StreamEvent::Complete { content }) => {
                if let Some(history) = self.history.as_mut() {
                    history.push(ChatMessage::user(self.user_message.clone()));
                    history.push(ChatMessage::assistant(content.clone()));
                }
            }
            Some(StreamEvent::End) | None => {
                self.history = None;
            }
            _ => {}
        }
        event
    }

    /// Stop the turn; the session stays locked until this value is dropped
    pub fn cancel(&self) {
        self.stream.cancel();
    }

    pub async fn collect(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }

    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        stream::unfold(self, |mut turn| async move {
            let event = turn.next().await?;
            Some((event, turn))
        })
    }

    /// The turn as newline-delimited JSON records
    pub fn into_json_lines(self) -> impl Stream<Item = String> + Send + 'static {
        self.into_stream().map(|event| event.to_json_line())
    }
}
