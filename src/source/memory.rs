//! In-memory container for tests and local development.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::SourceError;

use super::{BlobContainer, ByteRange};

/// A [`BlobContainer`] backed by a sorted map of blob paths to bytes.
///
/// `BTreeMap` iteration order gives the lexicographic listing order the
/// trait contract requires for free.
pub struct InMemoryContainer {
    url: String,
    blobs: RwLock<BTreeMap<String, Bytes>>,
    exists: bool,
}

impl InMemoryContainer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            blobs: RwLock::new(BTreeMap::new()),
            exists: true,
        }
    }

    /// A container whose existence check fails, for testing the
    /// feed-not-enabled path.
    pub fn missing(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            blobs: RwLock::new(BTreeMap::new()),
            exists: false,
        }
    }

    pub async fn insert(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.blobs.write().await.insert(path.into(), data.into());
    }

    pub async fn remove(&self, path: &str) {
        self.blobs.write().await.remove(path);
    }
}

#[async_trait]
impl BlobContainer for InMemoryContainer {
    fn url(&self) -> &str {
        &self.url
    }

    async fn exists(&self) -> Result<bool, SourceError> {
        Ok(self.exists)
    }

    async fn list_blobs(&self, prefix: &str) -> Result<Vec<String>, SourceError> {
        let blobs = self.blobs.read().await;
        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect())
    }

    async fn download(&self, path: &str, range: Option<ByteRange>) -> Result<Bytes, SourceError> {
        let blobs = self.blobs.read().await;
        let data = blobs
            .get(path)
            .ok_or_else(|| SourceError::NotFound(path.to_string()))?;

        match range {
            None => Ok(data.clone()),
            Some(range) => {
                let start = (range.offset as usize).min(data.len());
                let end = match range.length {
                    Some(length) => (start + length as usize).min(data.len()),
                    None => data.len(),
                };
                Ok(data.slice(start..end))
            }
        }
    }
}
