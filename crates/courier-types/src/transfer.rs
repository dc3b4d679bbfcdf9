//! File transfer chunk type.

/// Default chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// One bounded slice of a file, emitted in file order.
///
/// The sequence number is implicit: it is the chunk's position in the
/// stream. Concatenating every chunk's `content` in emission order
/// reproduces the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub content: Vec<u8>,
}

impl FileChunk {
    pub fn new(content: Vec<u8>) -> Self {
        Self { content }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl From<Vec<u8>> for FileChunk {
    fn from(content: Vec<u8>) -> Self {
        Self { content }
    }
}
