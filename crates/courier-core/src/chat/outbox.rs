//! Outbound queue and the single writer task that drains it.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use courier_types::chat::{ChatFrame, ChatMessage};
use courier_types::error::ChatError;

use super::state::StateTracker;
use super::FrameSink;

/// Producer handle for a session's outbound direction.
///
/// Cloneable; the direction half-closes once every clone is dropped.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<ChatMessage>,
}

impl Outbox {
    /// Queue a message, waiting for room if the queue is full.
    pub async fn send(&self, message: ChatMessage) -> Result<(), ChatError> {
        self.tx
            .send(message)
            .await
            .map_err(|_| ChatError::transport("outbound direction closed"))
    }

    /// Whether the writer has stopped accepting messages.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create an outbox and the receiving end the writer drains.
pub fn channel(capacity: usize) -> (Outbox, mpsc::Receiver<ChatMessage>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Outbox { tx }, rx)
}

/// What the writer task managed before it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterReport {
    /// Messages written (the closing `end` frame is not counted).
    pub sent: u64,
    /// Whether the `end` frame went out.
    pub half_closed: bool,
    pub error: Option<ChatError>,
}

/// Spawn the writer that owns `sink`.
///
/// Messages are written one at a time in queue order. When the queue closes
/// the writer sends `end` and stops. Cancellation stops it immediately with
/// no `end` frame.
pub fn spawn_writer<S: FrameSink>(
    sink: S,
    rx: mpsc::Receiver<ChatMessage>,
    cancel: CancellationToken,
    state: StateTracker,
) -> JoinHandle<WriterReport> {
    tokio::spawn(async move {
        let report = run_writer(sink, rx, &cancel).await;
        state.begin_closing();
        report
    })
}

async fn run_writer<S: FrameSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<ChatMessage>,
    cancel: &CancellationToken,
) -> WriterReport {
    let mut report = WriterReport {
        sent: 0,
        half_closed: false,
        error: None,
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return report,
            next = rx.recv() => next,
        };

        let Some(message) = next else {
            break;
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return report,
            result = sink.send(ChatFrame::Message(message)) => result,
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "chat writer stopped on send failure");
            report.error = Some(e);
            return report;
        }
        report.sent += 1;
    }

    let ended = tokio::select! {
        biased;
        _ = cancel.cancelled() => return report,
        result = sink.send(ChatFrame::End) => result,
    };
    match ended {
        Ok(()) => report.half_closed = true,
        // The peer may already be gone; nothing is lost.
        Err(e) => tracing::debug!(error = %e, "could not deliver end frame"),
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll};

    use futures_util::Sink;

    use crate::chat::ChannelState;

    #[derive(Default)]
    struct Recorded {
        frames: Vec<ChatFrame>,
        in_flight: usize,
        max_in_flight: usize,
    }

    /// Records frames and how many were started but not yet flushed.
    #[derive(Clone, Default)]
    struct RecordingSink {
        recorded: Arc<Mutex<Recorded>>,
        fail: bool,
    }

    impl Sink<ChatFrame> for RecordingSink {
        type Error = ChatError;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), ChatError>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: ChatFrame) -> Result<(), ChatError> {
            if self.fail {
                return Err(ChatError::transport("broken pipe"));
            }
            let mut recorded = self.recorded.lock().unwrap();
            recorded.in_flight += 1;
            recorded.max_in_flight = recorded.max_in_flight.max(recorded.in_flight);
            recorded.frames.push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), ChatError>> {
            self.recorded.lock().unwrap().in_flight = 0;
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), ChatError>> {
            self.poll_flush(cx)
        }
    }

    #[tokio::test]
    async fn concurrent_producers_keep_per_producer_order() {
        let sink = RecordingSink::default();
        let recorded = sink.recorded.clone();
        let state = StateTracker::new();
        let (outbox, rx) = channel(4);
        let writer = spawn_writer(sink, rx, CancellationToken::new(), state.clone());

        let mut producers = Vec::new();
        for user in ["a", "b", "c"] {
            let outbox = outbox.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..50 {
                    outbox
                        .send(ChatMessage::now(user, i.to_string()))
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            }));
        }
        drop(outbox);
        for p in producers {
            p.await.unwrap();
        }

        let report = writer.await.unwrap();
        assert_eq!(report.sent, 150);
        assert!(report.half_closed);
        assert_eq!(state.current(), ChannelState::Closing);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.max_in_flight, 1);
        assert_eq!(recorded.frames.last(), Some(&ChatFrame::End));
        for user in ["a", "b", "c"] {
            let seq: Vec<String> = recorded
                .frames
                .iter()
                .filter_map(|f| match f {
                    ChatFrame::Message(m) if m.user == user => Some(m.message.clone()),
                    _ => None,
                })
                .collect();
            let expected: Vec<String> = (0..50).map(|i| i.to_string()).collect();
            assert_eq!(seq, expected, "order for {user}");
        }
    }

    #[tokio::test]
    async fn cancellation_skips_end_frame() {
        let sink = RecordingSink::default();
        let recorded = sink.recorded.clone();
        let cancel = CancellationToken::new();
        let (outbox, rx) = channel(4);
        let writer = spawn_writer(sink, rx, cancel.clone(), StateTracker::new());

        outbox.send(ChatMessage::now("a", "one")).await.unwrap();
        tokio::task::yield_now().await;
        cancel.cancel();
        let report = writer.await.unwrap();
        assert!(!report.half_closed);
        assert!(outbox.is_closed());
        assert!(!recorded.lock().unwrap().frames.contains(&ChatFrame::End));
    }

    #[tokio::test]
    async fn send_failure_is_reported() {
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let (outbox, rx) = channel(4);
        let writer = spawn_writer(sink, rx, CancellationToken::new(), StateTracker::new());
        outbox.send(ChatMessage::now("a", "lost")).await.unwrap();
        let report = writer.await.unwrap();
        assert_eq!(report.sent, 0);
        assert!(matches!(report.error, Some(ChatError::Transport(_))));
        assert!(outbox.send(ChatMessage::now("a", "late")).await.is_err());
    }
}
