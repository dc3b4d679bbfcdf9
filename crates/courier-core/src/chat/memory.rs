//! In-process chat transport.
//!
//! Two connected endpoints backed by bounded channels. Dropping an endpoint's
//! sink ends the peer's stream; dropping its stream makes the peer's sends
//! fail.

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio_util::sync::{PollSendError, PollSender};

use courier_types::chat::ChatFrame;
use courier_types::error::ChatError;

use super::{BoxFrameSink, BoxFrameStream};

/// One side of an in-memory duplex.
pub struct MemoryEndpoint {
    pub sink: BoxFrameSink,
    pub stream: BoxFrameStream,
}

impl MemoryEndpoint {
    pub fn split(self) -> (BoxFrameSink, BoxFrameStream) {
        (self.sink, self.stream)
    }
}

/// Create a connected pair; each direction buffers up to `capacity` frames.
pub fn duplex(capacity: usize) -> (MemoryEndpoint, MemoryEndpoint) {
    let capacity = capacity.max(1);
    let (left_tx, left_rx) = mpsc::channel(capacity);
    let (right_tx, right_rx) = mpsc::channel(capacity);
    (endpoint(left_tx, right_rx), endpoint(right_tx, left_rx))
}

fn endpoint(tx: mpsc::Sender<ChatFrame>, rx: mpsc::Receiver<ChatFrame>) -> MemoryEndpoint {
    let sink = PollSender::new(tx).sink_map_err(peer_gone as fn(PollSendError<ChatFrame>) -> ChatError);
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|frame| (Ok(frame), rx))
    });
    MemoryEndpoint {
        sink: Box::pin(sink),
        stream: Box::pin(stream),
    }
}

fn peer_gone(_: PollSendError<ChatFrame>) -> ChatError {
    ChatError::transport("peer endpoint dropped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_types::chat::ChatMessage;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn frames_cross_in_both_directions() {
        let (mut left, mut right) = duplex(4);
        let hello = ChatFrame::Message(ChatMessage::now("l", "hello"));
        left.sink.send(hello.clone()).await.unwrap();
        right.sink.send(ChatFrame::End).await.unwrap();
        assert_eq!(right.stream.next().await.unwrap().unwrap(), hello);
        assert_eq!(left.stream.next().await.unwrap().unwrap(), ChatFrame::End);
    }

    #[tokio::test]
    async fn dropping_a_side_is_visible_to_the_peer() {
        let (left, right) = duplex(4);
        let (mut sink, mut stream) = left.split();
        drop(right);
        assert!(stream.next().await.is_none());
        assert!(sink.send(ChatFrame::End).await.is_err());
    }
}
