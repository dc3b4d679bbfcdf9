//! HTTP adapters for the greeter and file services.
//!
//! Unary calls read the JSON envelope; an entry in `errors` becomes
//! [`ClientError::Status`] with the wire code restored. Downloads stream the
//! response body as it arrives.

use futures_util::StreamExt;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use courier_core::client::{FileService, GreeterService, RemoteChunkStream};
use courier_types::api::{GreetReply, GreetRequest, TokenReply, TokenRequest, ValidateRequest};
use courier_types::error::{ClientError, ErrorCode, TransferError};
use courier_types::token::{Claims, SessionToken};
use courier_types::transfer::FileChunk;

use crate::http::error::code_for_status;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

fn transport(e: reqwest::Error) -> ClientError {
    ClientError::Transport(e.to_string())
}

/// Append `segments` to the base URL's path, percent-encoding each one.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ClientError::Transport(format!("'{base}' cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments.iter().copied());
    Ok(url)
}

/// Decode an envelope, turning its first error into a status error.
async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let bytes = response.bytes().await.map_err(transport)?;

    let envelope: Envelope<T> = serde_json::from_slice(&bytes).map_err(|e| {
        if status.is_success() {
            ClientError::Transport(format!("malformed response body: {e}"))
        } else {
            let body = String::from_utf8_lossy(&bytes);
            ClientError::status(code_for_status(status.as_u16()), format!("{status}: {}", body.trim()))
        }
    })?;

    if let Some(detail) = envelope.errors.into_iter().next() {
        return Err(ClientError::status(ErrorCode::from_wire(&detail.code), detail.message));
    }
    envelope
        .data
        .ok_or_else(|| ClientError::Transport("response envelope carried no data".to_string()))
}

/// The error carried by a non-success response.
async fn error_from(response: Response) -> ClientError {
    let status = response.status();
    match read_envelope::<serde_json::Value>(response).await {
        Err(e) => e,
        Ok(_) => ClientError::status(code_for_status(status.as_u16()), status.to_string()),
    }
}

/// Greeter calls over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGreeter {
    http: Client,
    base: Url,
}

impl HttpGreeter {
    pub fn new(http: Client, base: Url) -> Self {
        Self { http, base }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ClientError> {
        let url = endpoint(&self.base, segments)?;
        let response = self.http.post(url).json(body).send().await.map_err(transport)?;
        read_envelope(response).await
    }
}

impl GreeterService for HttpGreeter {
    async fn say_hello(&self, name: &str) -> Result<String, ClientError> {
        let body = GreetRequest {
            name: name.to_string(),
        };
        let reply: GreetReply = self.post(&["api", "v1", "greet"], &body).await?;
        Ok(reply.message)
    }

    async fn say_hello_again(&self, name: &str) -> Result<String, ClientError> {
        let body = GreetRequest {
            name: name.to_string(),
        };
        let reply: GreetReply = self.post(&["api", "v1", "greet", "again"], &body).await?;
        Ok(reply.message)
    }

    async fn issue_token(&self, client_id: &str) -> Result<SessionToken, ClientError> {
        let body = TokenRequest {
            client_id: client_id.to_string(),
        };
        let reply: TokenReply = self.post(&["api", "v1", "tokens"], &body).await?;
        Ok(SessionToken::new(reply.token))
    }

    async fn validate_token(&self, token: &SessionToken) -> Result<Claims, ClientError> {
        let body = ValidateRequest {
            token: token.as_str().to_string(),
        };
        self.post(&["api", "v1", "tokens", "validate"], &body).await
    }
}

/// File downloads over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFileService {
    http: Client,
    base: Url,
}

impl HttpFileService {
    pub fn new(http: Client, base: Url) -> Self {
        Self { http, base }
    }
}

impl FileService for HttpFileService {
    async fn download(
        &self,
        filename: &str,
        token: Option<&SessionToken>,
    ) -> Result<RemoteChunkStream, ClientError> {
        if filename.trim().is_empty() {
            return Err(TransferError::EmptyName.into());
        }

        // One segment: a `/` inside the name is percent-encoded and decoded
        // again by the server.
        let url = endpoint(&self.base, &["api", "v1", "files", filename])?;
        let mut request = self.http.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token.as_str());
        }

        let response = request.send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }

        let chunks = response.bytes_stream().map(|item| {
            item.map(|bytes| FileChunk::new(bytes.to_vec()))
                .map_err(transport)
        });
        Ok(Box::pin(chunks))
    }
}
