//! Duplex chat channel.
//!
//! A session pairs one reader loop and one writer task over a single
//! bidirectional frame transport. The writer is the only owner of the sink;
//! everything that wants to emit a message (the server heartbeat, the client
//! input pump) goes through a cloneable [`Outbox`]. When the last outbox is
//! dropped the writer sends [`ChatFrame::End`], the application-level
//! half-close.
//!
//! Per-session state moves `Open -> Closing -> Closed` and is published on a
//! `tokio::sync::watch` channel. `Closed` is only reached after both the
//! reader loop and the writer task have finished.
//!
//! [`ChatFrame::End`]: courier_types::chat::ChatFrame::End

pub mod heartbeat;
pub mod memory;
pub mod outbox;
pub mod reader;
pub mod session;
pub mod state;

use std::pin::Pin;

use futures_util::{Sink, Stream};
use serde::Serialize;
use uuid::Uuid;

use courier_types::chat::ChatFrame;
use courier_types::error::ChatError;

pub use outbox::Outbox;
pub use session::ChatSession;
pub use state::StateTracker;

/// Lifecycle of one chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Both directions active.
    Open,
    /// At least one direction has ended.
    Closing,
    /// Both directions ended and both tasks have stopped.
    Closed,
}

/// Why the reader loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The peer sent an `end` frame.
    PeerHalfClosed,
    /// The transport ended without a half-close.
    PeerDisconnected,
    /// The peer sent a session-ending keyword.
    Sentinel,
    /// The local side cancelled the session.
    Cancelled,
    /// Reading failed.
    TransportError,
}

/// Counters and outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    /// Messages read from the peer.
    pub received: u64,
    /// Messages written to the peer (heartbeats included).
    pub sent: u64,
    pub heartbeats: u64,
    pub close_reason: CloseReason,
    pub final_state: ChannelState,
}

/// Outbound half of a chat transport.
pub trait FrameSink: Sink<ChatFrame, Error = ChatError> + Send + Unpin + 'static {}

impl<T> FrameSink for T where T: Sink<ChatFrame, Error = ChatError> + Send + Unpin + 'static {}

/// Inbound half of a chat transport.
pub trait FrameStream: Stream<Item = Result<ChatFrame, ChatError>> + Send + Unpin + 'static {}

impl<T> FrameStream for T where T: Stream<Item = Result<ChatFrame, ChatError>> + Send + Unpin + 'static {}

pub type BoxFrameSink = Pin<Box<dyn Sink<ChatFrame, Error = ChatError> + Send>>;
pub type BoxFrameStream = Pin<Box<dyn Stream<Item = Result<ChatFrame, ChatError>> + Send>>;
