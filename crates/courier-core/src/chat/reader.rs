//! Inbound reader loop shared by both ends of a session.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use courier_types::chat::{ChatFrame, ChatMessage};
use courier_types::error::ChatError;

use super::{CloseReason, FrameStream};

/// Whether the reader should keep going after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

#[derive(Debug)]
pub struct ReadOutcome {
    pub received: u64,
    pub reason: CloseReason,
    /// Set when `reason` is [`CloseReason::TransportError`].
    pub error: Option<ChatError>,
}

/// Read frames until the peer half-closes, disconnects, errors, the callback
/// asks to stop, or `cancel` fires.
///
/// Undecodable frames are logged and skipped.
pub async fn read_frames<S, F>(
    stream: &mut S,
    cancel: &CancellationToken,
    mut on_message: F,
) -> ReadOutcome
where
    S: FrameStream,
    F: FnMut(ChatMessage) -> Flow,
{
    let mut received = 0u64;
    let (reason, error) = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break (CloseReason::Cancelled, None),
            next = stream.next() => next,
        };

        match next {
            Some(Ok(ChatFrame::Message(message))) => {
                received += 1;
                if on_message(message) == Flow::Stop {
                    break (CloseReason::Sentinel, None);
                }
            }
            Some(Ok(ChatFrame::End)) => break (CloseReason::PeerHalfClosed, None),
            Some(Err(ChatError::Decode(reason))) => {
                tracing::warn!(error = %reason, "ignoring malformed chat frame");
            }
            Some(Err(e)) => break (CloseReason::TransportError, Some(e)),
            None => break (CloseReason::PeerDisconnected, None),
        }
    };

    ReadOutcome {
        received,
        reason,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn msg(text: &str) -> Result<ChatFrame, ChatError> {
        Ok(ChatFrame::Message(ChatMessage::now("peer", text)))
    }

    #[tokio::test]
    async fn stops_on_end_frame() {
        let mut frames = stream::iter(vec![msg("a"), msg("b"), Ok(ChatFrame::End), msg("after")]);
        let mut seen = Vec::new();
        let outcome = read_frames(&mut frames, &CancellationToken::new(), |m| {
            seen.push(m.message);
            Flow::Continue
        })
        .await;
        assert_eq!(outcome.reason, CloseReason::PeerHalfClosed);
        assert_eq!(outcome.received, 2);
        assert_eq!(seen, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn skips_malformed_and_reports_disconnect() {
        let mut frames = stream::iter(vec![
            msg("a"),
            Err(ChatError::Decode("not json".to_string())),
            msg("b"),
        ]);
        let outcome = read_frames(&mut frames, &CancellationToken::new(), |_| Flow::Continue).await;
        assert_eq!(outcome.reason, CloseReason::PeerDisconnected);
        assert_eq!(outcome.received, 2);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn transport_error_is_terminal() {
        let mut frames = stream::iter(vec![msg("a"), Err(ChatError::transport("reset")), msg("b")]);
        let outcome = read_frames(&mut frames, &CancellationToken::new(), |_| Flow::Continue).await;
        assert_eq!(outcome.reason, CloseReason::TransportError);
        assert_eq!(outcome.received, 1);
        assert_eq!(outcome.error, Some(ChatError::Transport("reset".to_string())));
    }

    #[tokio::test]
    async fn callback_can_stop_reading() {
        let mut frames = stream::iter(vec![msg("hi"), msg("exit"), msg("ignored")]);
        let outcome = read_frames(&mut frames, &CancellationToken::new(), |m| {
            if m.is_sentinel() { Flow::Stop } else { Flow::Continue }
        })
        .await;
        assert_eq!(outcome.reason, CloseReason::Sentinel);
        assert_eq!(outcome.received, 2);
    }

    #[tokio::test]
    async fn cancellation_wins_over_pending_stream() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut frames = stream::pending::<Result<ChatFrame, ChatError>>();
        let outcome = read_frames(&mut frames, &cancel, |_| Flow::Continue).await;
        assert_eq!(outcome.reason, CloseReason::Cancelled);
    }
}
