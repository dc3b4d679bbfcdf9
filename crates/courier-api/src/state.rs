//! Application state shared by every HTTP and WebSocket handler.
//!
//! AppState pins the core engines to the concrete infra implementations and
//! holds the registry of live chat sessions.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use courier_core::auth::TokenAuthority;
use courier_core::transfer::TransferEngine;
use courier_infra::filesystem::LocalFileSource;
use courier_types::config::{ChatConfig, ServerConfig};

pub type ConcreteTransferEngine = TransferEngine<LocalFileSource>;

/// A chat session currently being served.
#[derive(Debug, Clone)]
pub struct ActiveChat {
    pub cancel: CancellationToken,
    pub client_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub authority: Arc<TokenAuthority>,
    pub transfer: Arc<ConcreteTransferEngine>,
    pub chat_config: Arc<ChatConfig>,
    /// Reject download and chat calls that carry no valid token.
    pub enforce_tokens: bool,
    pub chat_sessions: Arc<DashMap<Uuid, ActiveChat>>,
    /// Parent of every session's cancellation token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the engines for `config`, serving files from `files_root`.
    ///
    /// `files_root` must already exist.
    pub fn new(config: &ServerConfig, files_root: &Path) -> anyhow::Result<Self> {
        let source = LocalFileSource::new(files_root).map_err(|e| {
            anyhow::anyhow!("cannot open file root {}: {e}", files_root.display())
        })?;

        Ok(Self {
            authority: Arc::new(TokenAuthority::new(&config.token)),
            transfer: Arc::new(TransferEngine::new(source, &config.transfer)),
            chat_config: Arc::new(config.chat.clone()),
            enforce_tokens: config.enforce_tokens,
            chat_sessions: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Cancel a single live session. Returns false if it is not registered.
    pub fn cancel_chat(&self, session_id: &Uuid) -> bool {
        match self.chat_sessions.get(session_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Stop every live chat session.
    pub fn shutdown(&self) {
        let live = self.chat_sessions.len();
        if live > 0 {
            tracing::info!(live, "cancelling chat sessions for shutdown");
        }
        self.shutdown.cancel();
    }
}
