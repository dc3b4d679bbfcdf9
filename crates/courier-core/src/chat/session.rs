//! Chat session orchestration for both ends of the channel.
//!
//! [`ChatSession::serve`] runs the server side: reader loop in the calling
//! task, writer task, heartbeat task. [`ChatSession::join`] runs the client
//! side: reader loop, writer task, input pump. Either call returns only after
//! every task it spawned has stopped.

use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use courier_types::chat::{is_sentinel, ChatMessage};
use courier_types::config::ChatConfig;
use courier_types::error::ChatError;

use super::heartbeat::spawn_heartbeat;
use super::outbox::{self, spawn_writer, Outbox, WriterReport};
use super::reader::{read_frames, Flow, ReadOutcome};
use super::state::StateTracker;
use super::{ChannelState, CloseReason, FrameSink, FrameStream, SessionSummary};

/// One chat session. Consumed by [`serve`](Self::serve) or
/// [`join`](Self::join).
#[derive(Debug)]
pub struct ChatSession {
    id: Uuid,
    state: StateTracker,
    cancel: CancellationToken,
}

impl ChatSession {
    /// New session; cancelling `cancel` stops it from outside.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::now_v7(),
            state: StateTracker::new(),
            cancel,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ChannelState {
        self.state.current()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serve one client over `sink`/`stream`.
    ///
    /// Every received message is logged and, if `inbox` is given, forwarded
    /// to it. A sentinel payload from the client ends the reader loop.
    pub async fn serve<Si, St>(
        self,
        config: &ChatConfig,
        sink: Si,
        mut stream: St,
        inbox: Option<mpsc::UnboundedSender<ChatMessage>>,
    ) -> Result<SessionSummary, ChatError>
    where
        Si: FrameSink,
        St: FrameStream,
    {
        let session_id = self.id;
        tracing::info!(%session_id, "chat session started");

        let (outbox, rx) = outbox::channel(config.outbound_capacity);
        let writer = spawn_writer(sink, rx, self.cancel.clone(), self.state.clone());
        let heartbeat_cancel = self.cancel.child_token();
        let heartbeat = spawn_heartbeat(outbox, config, heartbeat_cancel.clone());

        let read = read_frames(&mut stream, &self.cancel, |message| {
            tracing::info!(
                %session_id,
                user = %message.user,
                message = %message.message,
                "chat message received"
            );
            let sentinel = message.is_sentinel();
            if let Some(inbox) = &inbox {
                let _ = inbox.send(message);
            }
            if sentinel {
                tracing::info!(%session_id, "client exited the chat");
                Flow::Stop
            } else {
                Flow::Continue
            }
        })
        .await;
        self.state.begin_closing();

        // The heartbeat holds the last outbox; once it is gone the writer
        // drains and half-closes.
        heartbeat_cancel.cancel();
        let heartbeats = join_counter(heartbeat, "heartbeat").await;
        let written = join_writer(writer).await;
        drop(stream);

        self.finish(read, written, heartbeats)
    }

    /// Join a chat as `user`, sending each line of `input` and delivering
    /// server messages to `output`.
    ///
    /// A sentinel line ends the local direction. If the server half-closes
    /// first, this keeps waiting until `input` ends or yields a sentinel; if
    /// the server disconnects or errors, pending input is abandoned.
    pub async fn join<Si, St, I>(
        self,
        user: &str,
        capacity: usize,
        sink: Si,
        mut stream: St,
        input: I,
        output: mpsc::UnboundedSender<ChatMessage>,
    ) -> Result<SessionSummary, ChatError>
    where
        Si: FrameSink,
        St: FrameStream,
        I: Stream<Item = String> + Send + Unpin + 'static,
    {
        let session_id = self.id;
        tracing::debug!(%session_id, %user, "joining chat");

        let (outbox, rx) = outbox::channel(capacity);
        let writer = spawn_writer(sink, rx, self.cancel.clone(), self.state.clone());
        let pump_cancel = self.cancel.child_token();
        let pump = spawn_input_pump(user.to_string(), input, outbox, pump_cancel.clone());

        let read = read_frames(&mut stream, &self.cancel, |message| {
            let _ = output.send(message);
            Flow::Continue
        })
        .await;
        self.state.begin_closing();

        if read.reason != CloseReason::PeerHalfClosed {
            pump_cancel.cancel();
        }
        join_counter(pump, "input pump").await;
        let written = join_writer(writer).await;
        drop(stream);

        self.finish(read, written, 0)
    }

    fn finish(
        self,
        read: ReadOutcome,
        written: WriterReport,
        heartbeats: u64,
    ) -> Result<SessionSummary, ChatError> {
        self.state.finish();
        let summary = SessionSummary {
            session_id: self.id,
            received: read.received,
            sent: written.sent,
            heartbeats,
            close_reason: read.reason,
            final_state: self.state.current(),
        };
        tracing::info!(
            session_id = %summary.session_id,
            received = summary.received,
            sent = summary.sent,
            heartbeats = summary.heartbeats,
            close_reason = ?summary.close_reason,
            final_state = ?summary.final_state,
            "chat session closed"
        );

        if let Some(e) = read.error {
            return Err(e);
        }
        match written.error {
            // A vanished peer also breaks the outbound direction.
            Some(_) if read.reason == CloseReason::PeerDisconnected => Ok(summary),
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

/// Forward input lines into the outbox until a sentinel, end of input, or
/// cancellation. Dropping the outbox on exit half-closes the direction.
fn spawn_input_pump<I>(
    user: String,
    mut input: I,
    outbox: Outbox,
    cancel: CancellationToken,
) -> JoinHandle<u64>
where
    I: Stream<Item = String> + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut forwarded = 0u64;
        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = input.next() => line,
            };
            let Some(line) = line else {
                break;
            };
            if is_sentinel(&line) {
                break;
            }
            let queued = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                queued = outbox.send(ChatMessage::now(user.as_str(), line)) => queued,
            };
            if queued.is_err() {
                break;
            }
            forwarded += 1;
        }
        forwarded
    })
}

async fn join_counter(handle: JoinHandle<u64>, task: &str) -> u64 {
    match handle.await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(task, error = %e, "chat task did not finish cleanly");
            0
        }
    }
}

async fn join_writer(handle: JoinHandle<WriterReport>) -> WriterReport {
    match handle.await {
        Ok(report) => report,
        Err(e) => WriterReport {
            sent: 0,
            half_closed: false,
            error: Some(ChatError::TaskFailed(e.to_string())),
        },
    }
}
