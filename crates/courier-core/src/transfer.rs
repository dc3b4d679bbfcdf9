//! Chunked transfer engine.
//!
//! Streams a named resource as an ordered, finite sequence of bounded
//! [`FileChunk`]s. The resource is opened eagerly so that a missing file is
//! reported once, before any chunk exists; after that every failure is a
//! terminal stream item and chunks already delivered stay delivered.

use std::collections::HashMap;
use std::future::Future;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};

use courier_types::config::TransferConfig;
use courier_types::error::TransferError;
use courier_types::transfer::FileChunk;

/// Boxed, single-use stream of chunks in file order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<FileChunk, TransferError>> + Send>>;

/// Read access to named resources under some root.
///
/// Implementations decide how names resolve (and which names are refused);
/// the engine only needs an async reader for a name.
pub trait FileSource: Send + Sync {
    type Reader: AsyncRead + Send + Unpin + 'static;

    /// Open `name` for reading. Missing resources are [`TransferError::NotFound`].
    fn open(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Self::Reader, TransferError>> + Send;
}

/// Serves `DownloadFile` over any [`FileSource`].
pub struct TransferEngine<F> {
    source: F,
    chunk_size: usize,
}

impl<F: FileSource> TransferEngine<F> {
    pub fn new(source: F, config: &TransferConfig) -> Self {
        Self {
            source,
            chunk_size: config.chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    /// Open `filename` and return its chunk stream.
    ///
    /// Errors returned here happen before any chunk is produced.
    pub async fn download(&self, filename: &str) -> Result<ChunkStream, TransferError> {
        if filename.trim().is_empty() {
            return Err(TransferError::EmptyName);
        }

        let reader = self.source.open(filename).await?;
        tracing::debug!(filename = %filename, chunk_size = self.chunk_size, "download started");
        Ok(chunk_stream(reader, self.chunk_size, filename.to_string()))
    }
}

/// In-memory [`FileSource`], keyed by exact name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemorySource {
    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }
}

impl FileSource for MemorySource {
    type Reader = Cursor<Arc<[u8]>>;

    async fn open(&self, name: &str) -> Result<Self::Reader, TransferError> {
        self.files
            .get(name)
            .cloned()
            .map(Cursor::new)
            .ok_or_else(|| TransferError::NotFound(name.to_string()))
    }
}

/// Turn a reader into a chunk stream.
///
/// Each buffer is filled completely before it is emitted, so every chunk
/// except the last is exactly `chunk_size` bytes. An empty reader yields no
/// chunks. Dropping the stream drops the reader.
pub fn chunk_stream<R>(mut reader: R, chunk_size: usize, label: String) -> ChunkStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let chunk_size = chunk_size.max(1);
    Box::pin(async_stream::stream! {
        let mut bytes_sent: u64 = 0;
        let mut chunks: u64 = 0;
        loop {
            let mut buf = vec![0u8; chunk_size];
            match fill_buffer(&mut reader, &mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    buf.truncate(n);
                    bytes_sent += n as u64;
                    chunks += 1;
                    yield Ok(FileChunk::new(buf));
                    if n < chunk_size {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        filename = %label,
                        bytes_sent,
                        error = %e,
                        "download aborted mid-stream"
                    );
                    yield Err(TransferError::Io {
                        bytes_sent,
                        message: e.to_string(),
                    });
                    return;
                }
            }
        }
        tracing::debug!(filename = %label, bytes_sent, chunks, "download complete");
    })
}

/// Read until `buf` is full or the reader is exhausted.
async fn fill_buffer<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
