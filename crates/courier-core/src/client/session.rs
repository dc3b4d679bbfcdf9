//! The session client: authentication flow plus the three server capabilities.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use courier_types::chat::ChatMessage;
use courier_types::error::{ClientError, ErrorCode};
use courier_types::token::{Claims, SessionToken};

use super::{
    AuthMode, AuthOutcome, ChatService, CredentialStore, Credentials, FileService,
    GreeterService, TransferReport,
};
use crate::chat::{ChatSession, SessionSummary};

const DEFAULT_CHAT_CAPACITY: usize = 64;

/// Caller-side composition of the greeter, file, and chat services plus a
/// credential store.
pub struct SessionClient<G, F, C, S> {
    greeter: G,
    files: F,
    chat: C,
    store: S,
    credentials: Option<Credentials>,
    chat_capacity: usize,
}

impl<G, F, C, S> SessionClient<G, F, C, S>
where
    G: GreeterService,
    F: FileService,
    C: ChatService,
    S: CredentialStore,
{
    pub fn new(greeter: G, files: F, chat: C, store: S) -> Self {
        Self {
            greeter,
            files,
            chat,
            store,
            credentials: None,
            chat_capacity: DEFAULT_CHAT_CAPACITY,
        }
    }

    pub fn with_chat_capacity(mut self, capacity: usize) -> Self {
        self.chat_capacity = capacity.max(1);
        self
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.credentials.as_ref().map(|c| &c.token)
    }

    /// Load stored credentials, if any.
    pub async fn restore(&mut self) -> Result<Option<&Credentials>, ClientError> {
        if self.credentials.is_none() {
            self.credentials = self.store.load().await?;
            if let Some(creds) = &self.credentials {
                tracing::debug!(client_id = %creds.client_id, "restored stored credentials");
            }
        }
        Ok(self.credentials.as_ref())
    }

    /// Load stored credentials and check the server still accepts the token.
    ///
    /// An expired or rejected token is replaced by a fresh one for the same
    /// client id, which is persisted. `Ok(None)` when nothing is stored.
    pub async fn ensure_fresh(&mut self) -> Result<Option<&Credentials>, ClientError> {
        let Some(current) = self.restore().await?.cloned() else {
            return Ok(None);
        };

        match self.validate_token(&current.token).await {
            Ok(_) => {}
            Err(e) if is_stale(&e) => {
                tracing::info!(
                    client_id = %current.client_id,
                    error = %e,
                    "stored token rejected, issuing a new one"
                );
                let token = self.greeter.issue_token(&current.client_id).await?;
                let credentials = Credentials {
                    token,
                    client_id: current.client_id,
                };
                self.store.save(&credentials).await?;
                self.credentials = Some(credentials);
            }
            Err(e) => return Err(e),
        }
        Ok(self.credentials.as_ref())
    }

    /// Authenticate as `client_id`.
    ///
    /// Stored credentials for the same client id are reused while the server
    /// still accepts their token. Otherwise the register or login greeting is
    /// sent, a token is issued, and the new credentials are persisted.
    pub async fn authenticate(
        &mut self,
        client_id: &str,
        mode: AuthMode,
    ) -> Result<AuthOutcome, ClientError> {
        let client_id = client_id.trim();
        let cached = self.restore().await?.cloned();
        if let Some(credentials) = cached.filter(|c| c.client_id == client_id) {
            match self.validate_token(&credentials.token).await {
                Ok(_) => {
                    return Ok(AuthOutcome {
                        credentials,
                        greeting: None,
                    });
                }
                Err(e) if is_stale(&e) => {
                    tracing::info!(client_id, error = %e, "stored token rejected, authenticating again");
                }
                Err(e) => return Err(e),
            }
        }

        let greeting = self.greet(client_id, mode).await?;
        let token = self.greeter.issue_token(client_id).await?;
        let credentials = Credentials {
            token,
            client_id: client_id.to_string(),
        };
        self.store.save(&credentials).await?;
        tracing::info!(client_id = %credentials.client_id, ?mode, "authenticated");
        self.credentials = Some(credentials.clone());

        Ok(AuthOutcome {
            credentials,
            greeting: Some(greeting),
        })
    }

    /// Send the greeting matching `mode`.
    pub async fn greet(&self, name: &str, mode: AuthMode) -> Result<String, ClientError> {
        match mode {
            AuthMode::Register => self.greeter.say_hello(name).await,
            AuthMode::Login => self.greeter.say_hello_again(name).await,
        }
    }

    /// Issue a fresh token for the current client id without storing it.
    pub async fn refresh_token(&self) -> Result<SessionToken, ClientError> {
        let creds = self.require_credentials()?;
        self.greeter.issue_token(&creds.client_id).await
    }

    /// Ask the server to validate the current token.
    pub async fn validate(&self) -> Result<Claims, ClientError> {
        let creds = self.require_credentials()?;
        self.validate_token(&creds.token).await
    }

    /// Ask the server to validate an arbitrary token.
    pub async fn validate_token(&self, token: &SessionToken) -> Result<Claims, ClientError> {
        self.greeter.validate_token(token).await
    }

    /// Forget the current credentials and remove them from the store.
    pub async fn logout(&mut self) -> Result<bool, ClientError> {
        self.credentials = None;
        let removed = self.store.clear().await?;
        tracing::info!(removed, "logged out");
        Ok(removed)
    }

    /// Download `filename` into `dest`, writing chunks in arrival order.
    ///
    /// Chunks go to `<dest>.part`, which is renamed over `dest` once the
    /// stream ends cleanly. Nothing is created if the download cannot start.
    /// A failure after that returns [`ClientError::PartialTransfer`] naming
    /// the partial file and leaves `dest` untouched.
    pub async fn download_to(
        &self,
        filename: &str,
        dest: &Path,
    ) -> Result<TransferReport, ClientError> {
        let mut chunks = self.files.download(filename, self.token()).await?;
        let part = partial_path(dest);
        let mut file = tokio::fs::File::create(&part).await?;
        let mut report = TransferReport {
            bytes: 0,
            chunks: 0,
        };

        while let Some(chunk) = chunks.next().await {
            let written = match chunk {
                Ok(chunk) => file.write_all(&chunk.content).await.map(|()| chunk.len()),
                Err(e) => return Err(partial(report.bytes, &part, e)),
            };
            match written {
                Ok(n) => {
                    report.bytes += n as u64;
                    report.chunks += 1;
                }
                Err(e) => return Err(partial(report.bytes, &part, e.into())),
            }
        }
        file.flush()
            .await
            .map_err(|e| partial(report.bytes, &part, e.into()))?;
        drop(file);
        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| partial(report.bytes, &part, e.into()))?;

        tracing::info!(
            filename = %filename,
            dest = %dest.display(),
            bytes = report.bytes,
            chunks = report.chunks,
            "download finished"
        );
        Ok(report)
    }

    /// Chat as the current client until the session closes.
    ///
    /// Lines from `input` are sent in order; a sentinel line (`exit`/`quit`)
    /// ends the local direction. Server messages go to `output`.
    pub async fn chat<I>(
        &self,
        input: I,
        output: mpsc::UnboundedSender<ChatMessage>,
        cancel: CancellationToken,
    ) -> Result<SessionSummary, ClientError>
    where
        I: Stream<Item = String> + Send + Unpin + 'static,
    {
        let creds = self.require_credentials()?;
        let (sink, stream) = self.chat.open(Some(&creds.token)).await?;
        let session = ChatSession::new(cancel);
        let summary = session
            .join(&creds.client_id, self.chat_capacity, sink, stream, input, output)
            .await?;
        Ok(summary)
    }

    fn require_credentials(&self) -> Result<&Credentials, ClientError> {
        self.credentials
            .as_ref()
            .ok_or_else(|| ClientError::Credentials("not logged in".to_string()))
    }
}

/// Errors meaning the token itself is no good, as opposed to the server
/// being unreachable.
fn is_stale(err: &ClientError) -> bool {
    matches!(
        err.code(),
        ErrorCode::Unauthenticated | ErrorCode::InvalidToken
    )
}

/// `<dest>.part`, next to `dest`.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

fn partial(bytes_written: u64, part: &Path, source: ClientError) -> ClientError {
    ClientError::PartialTransfer {
        bytes_written,
        partial: part.to_path_buf(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use courier_types::config::{ChatConfig, TokenConfig, TransferConfig};
    use courier_types::token::SessionToken;
    use courier_types::transfer::FileChunk;

    use crate::auth::TokenAuthority;
    use crate::chat::CloseReason;
    use crate::client::local::{
        LocalChatService, LocalFileService, LocalGreeter, MemoryCredentialStore,
    };
    use crate::client::RemoteChunkStream;
    use crate::transfer::{MemorySource, TransferEngine};

    type TestClient =
        SessionClient<LocalGreeter, LocalFileService<MemorySource>, LocalChatService, MemoryCredentialStore>;

    fn client_with(source: MemorySource, store: MemoryCredentialStore) -> TestClient {
        let authority = Arc::new(TokenAuthority::new(&TokenConfig::default()));
        let engine = Arc::new(TransferEngine::new(source, &TransferConfig::default()));
        SessionClient::new(
            LocalGreeter::new(authority),
            LocalFileService::new(engine),
            LocalChatService::new(ChatConfig::default(), CancellationToken::new()),
            store,
        )
    }

    fn client() -> TestClient {
        client_with(MemorySource::default(), MemoryCredentialStore::default())
    }

    #[tokio::test]
    async fn register_issues_and_persists_credentials() {
        let store = MemoryCredentialStore::default();
        let mut client = client_with(MemorySource::default(), store.clone());

        let outcome = client.authenticate("alice", AuthMode::Register).await.unwrap();
        assert_eq!(outcome.greeting.as_deref(), Some("Hello alice"));
        assert_eq!(outcome.credentials.client_id, "alice");
        assert_eq!(store.snapshot(), Some(outcome.credentials.clone()));

        let claims = client.validate().await.unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[tokio::test]
    async fn cached_credentials_short_circuit() {
        let store = MemoryCredentialStore::default();
        let mut first = client_with(MemorySource::default(), store.clone());
        let issued = first.authenticate("bob", AuthMode::Login).await.unwrap();
        assert_eq!(issued.greeting.as_deref(), Some("Hello again bob"));

        let mut second = client_with(MemorySource::default(), store);
        let reused = second.authenticate("bob", AuthMode::Login).await.unwrap();
        assert!(reused.greeting.is_none());
        assert_eq!(reused.credentials, issued.credentials);
    }

    /// Credentials for `client_id` whose token expired an hour ago.
    fn expired_credentials(client_id: &str) -> Credentials {
        let authority = TokenAuthority::new(&TokenConfig::default());
        let issued = authority
            .issue_at(client_id, chrono::Utc::now() - chrono::Duration::hours(1))
            .unwrap();
        Credentials {
            token: issued.token,
            client_id: client_id.to_string(),
        }
    }

    #[tokio::test]
    async fn expired_cached_credentials_are_not_reused() {
        let store = MemoryCredentialStore::default();
        let stale = expired_credentials("bob");
        store.save(&stale).await.unwrap();

        let mut client = client_with(MemorySource::default(), store.clone());
        let outcome = client.authenticate("bob", AuthMode::Login).await.unwrap();
        assert_eq!(outcome.greeting.as_deref(), Some("Hello again bob"));
        assert_ne!(outcome.credentials.token, stale.token);
        assert_eq!(store.snapshot(), Some(outcome.credentials));
        assert_eq!(client.validate().await.unwrap().sub, "bob");
    }

    #[tokio::test]
    async fn ensure_fresh_replaces_expired_token() {
        let store = MemoryCredentialStore::default();
        let stale = expired_credentials("frank");
        store.save(&stale).await.unwrap();

        let mut client = client_with(MemorySource::default(), store.clone());
        let fresh = client.ensure_fresh().await.unwrap().cloned().unwrap();
        assert_eq!(fresh.client_id, "frank");
        assert_ne!(fresh.token, stale.token);
        assert_eq!(store.snapshot(), Some(fresh));
        assert_eq!(client.validate().await.unwrap().sub, "frank");
    }

    #[tokio::test]
    async fn ensure_fresh_keeps_valid_token() {
        let store = MemoryCredentialStore::default();
        let mut first = client_with(MemorySource::default(), store.clone());
        let issued = first.authenticate("gina", AuthMode::Register).await.unwrap();

        let mut second = client_with(MemorySource::default(), store.clone());
        let kept = second.ensure_fresh().await.unwrap().cloned();
        assert_eq!(kept, Some(issued.credentials));
        assert!(client().ensure_fresh().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_token_does_not_replace_stored_token() {
        let store = MemoryCredentialStore::default();
        let mut client = client_with(MemorySource::default(), store.clone());
        let outcome = client.authenticate("carol", AuthMode::Register).await.unwrap();
        let fresh = client.refresh_token().await.unwrap();
        assert_ne!(fresh, outcome.credentials.token);
        assert_eq!(store.snapshot().unwrap().token, outcome.credentials.token);
    }

    #[tokio::test]
    async fn logout_clears_store() {
        let store = MemoryCredentialStore::default();
        let mut client = client_with(MemorySource::default(), store.clone());
        client.authenticate("dave", AuthMode::Register).await.unwrap();
        assert!(client.logout().await.unwrap());
        assert!(client.credentials().is_none());
        assert!(store.snapshot().is_none());
        assert!(!client.logout().await.unwrap());
        let err = client.refresh_token().await.unwrap_err();
        assert!(matches!(err, ClientError::Credentials(_)));
    }

    #[tokio::test]
    async fn empty_client_id_surfaces_invalid_argument() {
        let mut client = client();
        let err = client.authenticate("  ", AuthMode::Register).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[tokio::test]
    async fn download_writes_file_in_order() {
        let content: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
        let client = client_with(
            MemorySource::default().with_file("report.bin", content.clone()),
            MemoryCredentialStore::default(),
        );
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("downloaded_report.bin");

        let report = client.download_to("report.bin", &dest).await.unwrap();
        assert_eq!(report, TransferReport { bytes: 5000, chunks: 5 });
        assert_eq!(std::fs::read(&dest).unwrap(), content);
    }

    #[tokio::test]
    async fn download_replaces_existing_destination() {
        let client = client_with(
            MemorySource::default().with_file("notes.txt", b"new notes".to_vec()),
            MemoryCredentialStore::default(),
        );
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("downloaded_notes.txt");
        std::fs::write(&dest, b"old notes that were longer").unwrap();

        client.download_to("notes.txt", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"new notes");
        assert!(!dir.path().join("downloaded_notes.txt.part").exists());
    }

    /// Yields one chunk, then fails like a dropped connection.
    struct InterruptedFiles {
        first: Vec<u8>,
    }

    impl FileService for InterruptedFiles {
        async fn download(
            &self,
            _filename: &str,
            _token: Option<&SessionToken>,
        ) -> Result<RemoteChunkStream, ClientError> {
            let items = vec![
                Ok(FileChunk::new(self.first.clone())),
                Err(ClientError::Transport("connection reset".to_string())),
            ];
            Ok(Box::pin(futures_util::stream::iter(items)))
        }
    }

    #[tokio::test]
    async fn interrupted_download_reports_partial_and_keeps_destination() {
        let authority = Arc::new(TokenAuthority::new(&TokenConfig::default()));
        let client = SessionClient::new(
            LocalGreeter::new(authority),
            InterruptedFiles {
                first: vec![9u8; 700],
            },
            LocalChatService::new(ChatConfig::default(), CancellationToken::new()),
            MemoryCredentialStore::default(),
        );
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("downloaded_big.bin");
        std::fs::write(&dest, b"previous download").unwrap();

        let (bytes_written, partial, source) =
            match client.download_to("big.bin", &dest).await.unwrap_err() {
                ClientError::PartialTransfer {
                    bytes_written,
                    partial,
                    source,
                } => (bytes_written, partial, source),
                other => panic!("expected a partial transfer, got {other:?}"),
            };
        assert_eq!(bytes_written, 700);
        assert_eq!(partial, dir.path().join("downloaded_big.bin.part"));
        assert_eq!(std::fs::read(&partial).unwrap(), vec![9u8; 700]);
        assert_eq!(source.code(), ErrorCode::Unavailable);
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous download");
    }

    #[test]
    fn partial_path_sits_next_to_destination() {
        assert_eq!(
            partial_path(Path::new("out/report.bin")),
            PathBuf::from("out/report.bin.part")
        );
        assert_eq!(partial_path(Path::new("a")), PathBuf::from("a.part"));
    }

    #[tokio::test]
    async fn missing_file_creates_nothing() {
        let client = client();
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("downloaded_nope.txt");
        let err = client.download_to("nope.txt", &dest).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn chat_requires_credentials() {
        let client = client();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = client
            .chat(futures_util::stream::empty::<String>(), tx, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Credentials(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn chat_round_trip_through_local_server() {
        let mut client = client();
        client.authenticate("erin", AuthMode::Register).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let input = futures_util::stream::iter(vec!["hi".to_string(), "exit".to_string()]);
        let summary = client.chat(input, tx, CancellationToken::new()).await.unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.close_reason, CloseReason::PeerHalfClosed);
        while let Ok(message) = rx.try_recv() {
            assert_eq!(message.message, "Pong from server");
        }
    }
}
