//! File-backed credential store.
//!
//! The file holds two lines: the session token, then the client id.

use std::path::{Path, PathBuf};

use courier_core::client::{CredentialStore, Credentials};
use courier_types::error::ClientError;
use courier_types::token::SessionToken;

/// Stores credentials in a two-line text file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, ClientError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match parse(&content) {
            Some(credentials) => Ok(Some(credentials)),
            None => {
                tracing::warn!(
                    "Ignoring malformed credential file {}",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = format!("{}\n{}\n", credentials.token, credentials.client_id);
        tokio::fs::write(&self.path, content).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tracing::debug!(path = %self.path.display(), "saved credentials");
        Ok(())
    }

    async fn clear(&self) -> Result<bool, ClientError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

fn parse(content: &str) -> Option<Credentials> {
    let mut lines = content.lines().map(str::trim);
    let token = lines.next().filter(|t| !t.is_empty())?;
    let client_id = lines.next().filter(|c| !c.is_empty())?;
    Some(Credentials {
        token: SessionToken::new(token),
        client_id: client_id.to_string(),
    })
}
