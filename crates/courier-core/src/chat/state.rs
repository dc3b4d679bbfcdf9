//! Session state publication.

use std::sync::Arc;

use tokio::sync::watch;

use super::ChannelState;

/// Shared handle over a session's [`ChannelState`].
///
/// Transitions only move forward. Updates are applied even when nobody is
/// subscribed.
#[derive(Debug, Clone)]
pub struct StateTracker {
    tx: Arc<watch::Sender<ChannelState>>,
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ChannelState::Open);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> ChannelState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.tx.subscribe()
    }

    /// `Open -> Closing`. No-op in any later state.
    pub fn begin_closing(&self) {
        self.tx.send_if_modified(|state| {
            if *state == ChannelState::Open {
                *state = ChannelState::Closing;
                true
            } else {
                false
            }
        });
    }

    /// Move to `Closed`. Call only once both session tasks have stopped.
    pub fn finish(&self) {
        self.tx.send_if_modified(|state| {
            if *state == ChannelState::Closed {
                false
            } else {
                *state = ChannelState::Closed;
                true
            }
        });
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        let state = StateTracker::new();
        assert_eq!(state.current(), ChannelState::Open);
        state.begin_closing();
        assert_eq!(state.current(), ChannelState::Closing);
        state.finish();
        assert_eq!(state.current(), ChannelState::Closed);
        state.begin_closing();
        assert_eq!(state.current(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn subscribers_observe_changes() {
        let state = StateTracker::new();
        let mut rx = state.subscribe();
        state.begin_closing();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ChannelState::Closing);
        state.finish();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ChannelState::Closed);
    }
}
