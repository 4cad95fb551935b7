//! Storage transport abstraction.
//!
//! The feed layer only ever needs three operations against the change feed
//! container: existence check, prefix listing, and (ranged) download.
//! [`BlobContainer`] captures exactly that surface so the reading logic is
//! independent of any particular storage backend.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SourceError;

pub mod memory;

pub use memory::InMemoryContainer;

/// A half-open byte range within a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    /// Offset of the first byte to read.
    pub offset: u64,
    /// Number of bytes to read; `None` reads to the end of the blob.
    pub length: Option<u64>,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length: Some(length),
        }
    }

    /// Everything from `offset` to the end of the blob.
    pub fn from(offset: u64) -> Self {
        Self {
            offset,
            length: None,
        }
    }
}

/// Read-only view of one blob container.
///
/// `list_blobs` must return paths in lexicographic order; chunk ordering
/// within a shard depends on it.
#[async_trait]
pub trait BlobContainer: Send + Sync {
    /// Full URL of the container, including the account host.
    fn url(&self) -> &str;

    /// Whether the container exists at all.
    async fn exists(&self) -> Result<bool, SourceError>;

    /// List blob paths under `prefix`, lexicographically ordered.
    async fn list_blobs(&self, prefix: &str) -> Result<Vec<String>, SourceError>;

    /// Download a blob, or a byte range of it.
    async fn download(&self, path: &str, range: Option<ByteRange>) -> Result<Bytes, SourceError>;
}

/// Shared handle to a container implementation.
pub type ContainerRef = Arc<dyn BlobContainer>;
