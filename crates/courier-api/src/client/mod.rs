//! Remote client: the session client wired to HTTP and WebSocket adapters.

pub mod rest;
pub mod ws;

use reqwest::Url;

use courier_core::client::SessionClient;
use courier_infra::credentials::FileCredentialStore;
use courier_types::error::ClientError;

pub use rest::{HttpFileService, HttpGreeter};
pub use ws::WsChatService;

pub type RemoteClient =
    SessionClient<HttpGreeter, HttpFileService, WsChatService, FileCredentialStore>;

/// Build a client for the server at `server_url` (e.g. `http://127.0.0.1:50051`).
pub fn connect(server_url: &str, store: FileCredentialStore) -> Result<RemoteClient, ClientError> {
    let base = Url::parse(server_url).map_err(|e| {
        ClientError::Transport(format!("invalid server URL '{server_url}': {e}"))
    })?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ClientError::Transport(e.to_string()))?;

    Ok(SessionClient::new(
        HttpGreeter::new(http.clone(), base.clone()),
        HttpFileService::new(http, base.clone()),
        WsChatService::new(&base)?,
        store,
    ))
}
