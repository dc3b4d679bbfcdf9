//! In-process service adapters.
//!
//! These call the core components directly instead of going over a network.
//! Useful for embedding the whole stack in one process and for tests.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use courier_types::config::ChatConfig;
use courier_types::error::{ClientError, ErrorCode};
use courier_types::token::{Claims, SessionToken};

use super::{
    ChatService, CredentialStore, Credentials, FileService, GreeterService, RemoteChunkStream,
};
use crate::auth::TokenAuthority;
use crate::chat::memory::duplex;
use crate::chat::{BoxFrameSink, BoxFrameStream, ChatSession};
use crate::greeter;
use crate::transfer::{FileSource, TransferEngine};

/// Greeter backed by a local [`TokenAuthority`].
#[derive(Debug, Clone)]
pub struct LocalGreeter {
    authority: Arc<TokenAuthority>,
}

impl LocalGreeter {
    pub fn new(authority: Arc<TokenAuthority>) -> Self {
        Self { authority }
    }
}

impl GreeterService for LocalGreeter {
    async fn say_hello(&self, name: &str) -> Result<String, ClientError> {
        greeter::say_hello(name).map_err(|e| ClientError::status(e.code(), e.to_string()))
    }

    async fn say_hello_again(&self, name: &str) -> Result<String, ClientError> {
        greeter::say_hello_again(name).map_err(|e| ClientError::status(e.code(), e.to_string()))
    }

    async fn issue_token(&self, client_id: &str) -> Result<SessionToken, ClientError> {
        self.authority
            .issue(client_id)
            .map(|issued| issued.token)
            .map_err(|e| ClientError::status(e.code(), e.to_string()))
    }

    async fn validate_token(&self, token: &SessionToken) -> Result<Claims, ClientError> {
        self.authority
            .validate(token.as_str())
            .map_err(|e| ClientError::status(e.code(), e.to_string()))
    }
}

/// File service backed by a local [`TransferEngine`].
pub struct LocalFileService<F> {
    engine: Arc<TransferEngine<F>>,
}

impl<F> LocalFileService<F> {
    pub fn new(engine: Arc<TransferEngine<F>>) -> Self {
        Self { engine }
    }
}

impl<F: FileSource + 'static> FileService for LocalFileService<F> {
    async fn download(
        &self,
        filename: &str,
        _token: Option<&SessionToken>,
    ) -> Result<RemoteChunkStream, ClientError> {
        let chunks = self.engine.download(filename).await?;
        Ok(Box::pin(chunks.map(|chunk| chunk.map_err(ClientError::from))))
    }
}

/// Chat service that serves each opened session in a background task over an
/// in-memory duplex.
#[derive(Debug, Clone)]
pub struct LocalChatService {
    config: ChatConfig,
    shutdown: CancellationToken,
}

impl LocalChatService {
    pub fn new(config: ChatConfig, shutdown: CancellationToken) -> Self {
        Self { config, shutdown }
    }
}

impl ChatService for LocalChatService {
    async fn open(
        &self,
        _token: Option<&SessionToken>,
    ) -> Result<(BoxFrameSink, BoxFrameStream), ClientError> {
        let (server, client) = duplex(self.config.outbound_capacity);
        let session = ChatSession::new(self.shutdown.child_token());
        let config = self.config.clone();
        tokio::spawn(async move {
            if let Err(e) = session.serve(&config, server.sink, server.stream, None).await {
                tracing::warn!(error = %e, "local chat session failed");
            }
        });
        Ok(client.split())
    }
}

/// Credential store held in memory. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<Mutex<Option<Credentials>>>,
}

impl MemoryCredentialStore {
    pub fn snapshot(&self) -> Option<Credentials> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Credentials>>, ClientError> {
        self.slot
            .lock()
            .map_err(|_| ClientError::status(ErrorCode::Internal, "credential slot poisoned"))
    }
}

impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, ClientError> {
        Ok(self.lock()?.clone())
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), ClientError> {
        *self.lock()? = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<bool, ClientError> {
        Ok(self.lock()?.take().is_some())
    }
}
