//! Request and response bodies of the HTTP API.
//!
//! Both the axum handlers and the reqwest client use these, so the two sides
//! cannot drift apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /greet` and `POST /greet/again`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreetReply {
    pub message: String,
}

/// Body of `POST /tokens`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub client_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReply {
    pub token: String,
}

/// Body of `POST /tokens/validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReply {
    pub status: String,
    pub version: String,
}

/// One live chat session as listed by `GET /chat/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSessionInfo {
    pub session_id: String,
    /// Token subject, when the client presented a valid token.
    pub client_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Reply of `DELETE /chat/sessions/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSessionClosed {
    pub session_id: String,
    pub cancelled: bool,
}
