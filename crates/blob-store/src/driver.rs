use std::{collections::BTreeMap, io::Read, path::Path};

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::{Result, StoreError};

/// Chunk size used by streaming downloads when the caller does not pick one.
pub const DEFAULT_CHUNK_SIZE: usize = 8096;

/// Free-form driver attributes (content type, ACLs, user metadata).
pub type Extra = BTreeMap<String, String>;

/// Additional request headers, such as CORS headers.
pub type Headers = BTreeMap<String, String>;

/// Chunks handed to a streaming upload.
pub type ByteIter<'a> = Box<dyn Iterator<Item = Bytes> + Send + 'a>;

/// Chunks produced by a streaming download. Reads can fail midway.
pub type ByteStream = Box<dyn Iterator<Item = Result<Bytes>> + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// What a driver knows about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub name: String,
    pub container: String,
    pub size: u64,
    /// Hex sha256 of the content, when the driver tracks one.
    pub hash: Option<String>,
    pub extra: Extra,
}

/// A blob store backend. Mirrors the object-storage driver API of common
/// cloud SDKs; implementations own the wire protocol, hashing and cleanup.
pub trait StorageDriver: Send + Sync {
    /// Provider name, e.g. `local` or `s3`.
    fn name(&self) -> &str;

    fn get_container(&self, container_name: &str) -> Result<Container>;

    fn upload_object(
        &self,
        file_path: &Path,
        container: &Container,
        object_name: &str,
        extra: Option<&Extra>,
        verify_hash: bool,
        headers: Option<&Headers>,
    ) -> Result<ObjectMeta>;

    fn upload_object_via_stream(
        &self,
        iterator: ByteIter<'_>,
        container: &Container,
        object_name: &str,
        extra: Option<&Extra>,
        headers: Option<&Headers>,
    ) -> Result<ObjectMeta>;

    fn get_object(&self, container_name: &str, object_name: &str) -> Result<ObjectMeta>;

    /// Returns `true` once the object has been written to `destination_path`.
    fn download_object(
        &self,
        obj: &ObjectMeta,
        destination_path: &Path,
        overwrite_existing: bool,
        delete_on_failure: bool,
    ) -> Result<bool>;

    fn download_object_as_stream(
        &self,
        obj: &ObjectMeta,
        chunk_size: Option<usize>,
    ) -> Result<ByteStream>;
}

/// Rejects names that would escape a container when mapped onto a path.
pub fn validate_object_name(object_name: &str) -> Result<()> {
    let bad = object_name.is_empty()
        || object_name.starts_with('/')
        || object_name.contains('\\')
        || object_name
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(StoreError::InvalidObjectName(object_name.to_string()));
    }
    Ok(())
}

/// Running sha256 over a sequence of chunks.
#[derive(Default)]
pub(crate) struct ContentHasher {
    hasher: Sha256,
    bytes: u64,
}

impl ContentHasher {
    pub(crate) fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    pub(crate) fn finish(self) -> (String, u64) {
        (hex::encode(self.hasher.finalize()), self.bytes)
    }
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Yields a reader's content in fixed-size chunks.
pub(crate) struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    pub(crate) fn new(reader: R, chunk_size: Option<usize>) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.filter(|&c| c > 0).unwrap_or(DEFAULT_CHUNK_SIZE),
            done: false,
        }
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
            }
        }
        if filled == 0 {
            return None;
        }
        buf.truncate(filled);
        Some(Ok(Bytes::from(buf)))
    }
}
