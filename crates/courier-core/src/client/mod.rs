//! Caller-side session layer.
//!
//! The service contracts below are what a transport adapter has to provide
//! (HTTP/WebSocket adapters live in `courier-api`, in-process ones in
//! [`local`]). [`SessionClient`] composes one of each and drives the same
//! state machines the server runs, in mirror.

pub mod local;
pub mod session;

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};

use courier_types::error::ClientError;
use courier_types::token::{Claims, SessionToken};
use courier_types::transfer::FileChunk;

use crate::chat::{BoxFrameSink, BoxFrameStream};

pub use session::SessionClient;

/// Chunks as received by a caller, in server emission order.
pub type RemoteChunkStream = Pin<Box<dyn Stream<Item = Result<FileChunk, ClientError>> + Send>>;

/// Unary calls: greetings and token issuance/validation.
pub trait GreeterService: Send + Sync {
    fn say_hello(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;

    fn say_hello_again(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;

    fn issue_token(
        &self,
        client_id: &str,
    ) -> impl Future<Output = Result<SessionToken, ClientError>> + Send;

    fn validate_token(
        &self,
        token: &SessionToken,
    ) -> impl Future<Output = Result<Claims, ClientError>> + Send;
}

/// Server-streamed file download.
pub trait FileService: Send + Sync {
    /// Start a download. A missing file fails here, before any chunk.
    fn download(
        &self,
        filename: &str,
        token: Option<&SessionToken>,
    ) -> impl Future<Output = Result<RemoteChunkStream, ClientError>> + Send;
}

/// Opens the duplex chat transport.
pub trait ChatService: Send + Sync {
    fn open(
        &self,
        token: Option<&SessionToken>,
    ) -> impl Future<Output = Result<(BoxFrameSink, BoxFrameStream), ClientError>> + Send;
}

/// Persistence for the caller's credentials between runs.
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` when nothing usable is stored.
    fn load(&self) -> impl Future<Output = Result<Option<Credentials>, ClientError>> + Send;

    fn save(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Remove stored credentials. Returns whether anything was removed.
    fn clear(&self) -> impl Future<Output = Result<bool, ClientError>> + Send;
}

/// A token and the client id it was issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub token: SessionToken,
    pub client_id: String,
}

/// Which greeting starts a fresh authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// New user: `SayHello`.
    Register,
    /// Returning user: `SayHelloAgain`.
    Login,
}

/// Result of [`SessionClient::authenticate`].
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub credentials: Credentials,
    /// Server greeting; `None` when cached credentials were reused.
    pub greeting: Option<String>,
}

/// What a completed download wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub bytes: u64,
    pub chunks: u64,
}
