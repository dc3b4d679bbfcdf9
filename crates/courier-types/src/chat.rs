//! Chat message and wire frame types.
//!
//! A [`ChatMessage`] is the application payload; a [`ChatFrame`] is what
//! actually crosses the transport. `ChatFrame::End` is the application-level
//! half-close: the sender will write nothing more on its direction.

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

/// Payloads that end a chat session when typed locally or received from a peer.
pub const SENTINELS: [&str; 2] = ["exit", "quit"];

/// Whether `text` is a session-ending keyword (surrounding whitespace ignored).
pub fn is_sentinel(text: &str) -> bool {
    let trimmed = text.trim();
    SENTINELS.iter().any(|s| *s == trimmed)
}

/// A single chat message. Messages are independent of each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user: String,
    pub message: String,
    /// Unix timestamp in seconds, set by the sender.
    pub timestamp: i64,
}

impl ChatMessage {
    /// Build a message stamped with the current time.
    pub fn now(user: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        is_sentinel(&self.message)
    }
}

/// Unit of the chat wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatFrame {
    Message(ChatMessage),
    End,
}

impl ChatFrame {
    pub fn encode(&self) -> Result<String, ChatError> {
        serde_json::to_string(self).map_err(|e| ChatError::Encode(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ChatError> {
        serde_json::from_str(text).map_err(|e| ChatError::Decode(e.to_string()))
    }
}

impl From<ChatMessage> for ChatFrame {
    fn from(msg: ChatMessage) -> Self {
        ChatFrame::Message(msg)
    }
}
