//! Filesystem adapters for courier.
//!
//! [`LocalFileSource`] implements the `FileSource` port from `courier-core`
//! over a single root directory. Also resolves the data directory.

use std::path::{Component, Path, PathBuf};

use courier_core::transfer::FileSource;
use courier_types::error::TransferError;

/// Serves files from under one root directory.
///
/// The root is canonicalized once; each request is canonicalized again and
/// must still lie under it, so `..` segments and symlinks cannot escape.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    root: PathBuf,
}

impl LocalFileSource {
    /// Fails if `root` does not exist.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = std::fs::canonicalize(root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a requested name to a readable file under the root.
    pub async fn resolve(&self, name: &str) -> Result<PathBuf, TransferError> {
        if name.trim().is_empty() {
            return Err(TransferError::EmptyName);
        }

        let requested = Path::new(name);
        if requested.has_root()
            || requested
                .components()
                .any(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        {
            return Err(TransferError::OutsideRoot(name.to_string()));
        }

        let canonical = match tokio::fs::canonicalize(self.root.join(requested)).await {
            Ok(path) => path,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // Missing targets can't be canonicalized; still refuse
                // names that climb out lexically.
                if escapes_lexically(requested) {
                    return Err(TransferError::OutsideRoot(name.to_string()));
                }
                return Err(TransferError::NotFound(name.to_string()));
            }
            Err(err) => {
                tracing::debug!(filename = %name, error = %err, "cannot resolve download path");
                return Err(TransferError::NotFound(name.to_string()));
            }
        };

        if !canonical.starts_with(&self.root) {
            tracing::warn!(filename = %name, "rejected download outside the file root");
            return Err(TransferError::OutsideRoot(name.to_string()));
        }

        match tokio::fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => Ok(canonical),
            _ => Err(TransferError::NotFound(name.to_string())),
        }
    }
}

impl FileSource for LocalFileSource {
    type Reader = tokio::fs::File;

    async fn open(&self, name: &str) -> Result<Self::Reader, TransferError> {
        let path = self.resolve(name).await?;
        tokio::fs::File::open(&path).await.map_err(|err| {
            tracing::debug!(path = %path.display(), error = %err, "open failed");
            TransferError::NotFound(name.to_string())
        })
    }
}

fn escapes_lexically(path: &Path) -> bool {
    let mut depth: i64 = 0;
    for component in path.components() {
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            _ => {}
        }
        if depth < 0 {
            return true;
        }
    }
    false
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `COURIER_DATA_DIR` environment variable
/// 2. `~/.courier`
/// 3. `./.courier`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("COURIER_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".courier");
    }

    PathBuf::from(".courier")
}
