//! Ordered progress delivery for long-running device operations
//!
//! A [`ProgressSink`] is handed to the transport and a [`ProgressStream`] stays
//! with the caller. [`forward`] awaits the operation and the stream in the same
//! task, so events reach the callback in emission order and the last event is
//! delivered before the operation's output is returned.

use std::future::Future;

use serde::Serialize;
use tokio::sync::mpsc;

/// Default number of undelivered events before the sender waits
pub const DEFAULT_CAPACITY: usize = 32;

/// A single progress notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Position in the stream, starting at 1
    pub seq: u64,

    /// Free-form description of the current phase
    pub message: String,
}

/// Sending half, owned by the remote operation
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<String>,
}

impl ProgressSink {
    /// Emit a progress message, waiting if the stream is full
    pub async fn emit(&self, message: impl Into<String>) {
        // A closed stream only means nobody is listening anymore
        let _ = self.tx.send(message.into()).await;
    }
}

/// Receiving half, owned by the caller
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::Receiver<String>,
    next_seq: u64,
}

impl ProgressStream {
    /// Next event, or `None` once every sink is gone and the buffer is empty
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        let message = self.rx.recv().await?;
        Some(self.number(message))
    }

    fn try_next(&mut self) -> Option<ProgressEvent> {
        let message = self.rx.try_recv().ok()?;
        Some(self.number(message))
    }

    fn number(&mut self, message: String) -> ProgressEvent {
        self.next_seq += 1;
        ProgressEvent {
            seq: self.next_seq,
            message,
        }
    }
}

/// Create a bounded progress channel
pub fn channel(capacity: usize) -> (ProgressSink, ProgressStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressSink { tx }, ProgressStream { rx, next_seq: 0 })
}

/// Await `operation` while handing every event from `stream` to `on_event`
///
/// Buffered events are always delivered before a completed operation is
/// observed. Once the operation is done the stream is closed and drained, so
/// no event can reach `on_event` after this returns.
pub async fn forward<F, T, P>(operation: F, mut stream: ProgressStream, mut on_event: P) -> T
where
    F: Future<Output = T>,
    P: FnMut(ProgressEvent),
{
    tokio::pin!(operation);

    let output = loop {
        tokio::select! {
            biased;
            Some(event) = stream.next() => on_event(event),
            output = &mut operation => break output,
        }
    };

    stream.rx.close();
    while let Some(event) = stream.try_next() {
        on_event(event);
    }

    output
}
