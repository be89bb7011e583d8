//! Caller and worker ends of a turn's event channel

use std::time::Duration;

use futures::{stream, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::error::BridgeError;
use crate::types::{CancellationToken, StreamEvent};

/// The worker stopped early: its caller went away or asked it to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

/// Worker side: bounded sender that honours cancellation
pub(crate) struct EventSink {
    sender: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub(crate) fn new(sender: mpsc::Sender<StreamEvent>, cancel: CancellationToken) -> Self {
        Self { sender, cancel }
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails once the turn is cancelled
    pub(crate) fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Send one event, waiting for room in the channel
    pub(crate) async fn emit(&self, event: StreamEvent) -> Result<(), Cancelled> {
        self.checkpoint()?;
        self.sender.send(event).await.map_err(|_| {
            self.cancel.cancel();
            Cancelled
        })
    }
}

/// Caller side of one turn
///
/// Yields events until (and including) `end`. Each read waits at most the
/// configured read timeout; when it expires the stream yields a synthetic
/// `error` then `end`, and the worker is cancelled. Dropping the stream also
/// cancels the worker.
pub struct TurnStream {
    receiver: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    read_timeout: Duration,
    end_pending: bool,
    finished: bool,
}

impl TurnStream {
    pub(crate) fn new(
        receiver: mpsc::Receiver<StreamEvent>,
        cancel: CancellationToken,
        read_timeout: Duration,
    ) -> Self {
        Self {
            receiver,
            cancel,
            read_timeout,
            end_pending: false,
            finished: false,
        }
    }

    /// Stop the worker at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next event, or `None` after `end` has been yielded
    pub async fn next(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        if self.end_pending {
            self.end_pending = false;
            self.finished = true;
            return Some(StreamEvent::End);
        }

        match tokio::time::timeout(self.read_timeout, self.receiver.recv()).await {
            Ok(Some(event)) => {
                if event.is_end() {
                    self.finished = true;
                }
                Some(event)
            }
            // Worker gone without saying goodbye
            Ok(None) => {
                self.finished = true;
                Some(StreamEvent::End)
            }
            Err(_) => {
                self.cancel.cancel();
                self.receiver.close();
                self.end_pending = true;
                Some(StreamEvent::error(
                    BridgeError::StreamTimeout(self.read_timeout).to_string(),
                ))
            }
        }
    }

    /// Drain the turn into a vector
    pub async fn collect(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }

    /// Adapt into a `futures::Stream`
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

impl Drop for TurnStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for TurnStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnStream")
            .field("read_timeout", &self.read_timeout)
            .field("finished", &self.finished)
            .finish()
    }
}
