//! A segment: one hour-aligned partition, fanned out over shards.

use serde::Deserialize;
use tracing::debug;

use crate::error::FeedError;
use crate::source::ContainerRef;

use super::cursor::SegmentCursor;
use super::event::ChangeFeedEvent;
use super::shard::Shard;

/// The part of a segment manifest this reader consumes.
#[derive(Debug, Deserialize)]
struct SegmentManifest {
    #[serde(rename = "chunkFilePaths")]
    chunk_file_paths: Vec<String>,
}

/// One open segment, interleaving its shards round-robin.
pub struct Segment {
    segment_path: String,
    shards: Vec<Shard>,
    /// Next shard to poll in the rotation.
    shard_index: usize,
}

impl Segment {
    /// Open a segment from its manifest, optionally resuming shard
    /// positions from a recorded segment cursor.
    pub async fn create(
        container: ContainerRef,
        segment_path: String,
        segment_cursor: Option<&SegmentCursor>,
    ) -> Result<Self, FeedError> {
        let manifest_bytes = container.download(&segment_path, None).await?;
        let manifest: SegmentManifest =
            serde_json::from_slice(&manifest_bytes).map_err(|err| FeedError::InvalidMetadata {
                path: segment_path.clone(),
                message: err.to_string(),
            })?;
        debug!(segment = %segment_path, shards = manifest.chunk_file_paths.len(), "opening segment");

        // Every listed shard is opened, resumed ones at their cursor.
        // Exhausted shards stay in the set so the segment cursor keeps
        // covering them.
        let mut shards = Vec::with_capacity(manifest.chunk_file_paths.len());
        for shard_path in manifest.chunk_file_paths {
            let shard_path = strip_container_prefix(&shard_path).to_string();
            let shard_cursor = segment_cursor.and_then(|cursor| {
                cursor
                    .shard_cursors
                    .iter()
                    .find(|sc| sc.shard_path == shard_path)
            });
            shards.push(Shard::create(container.clone(), shard_path, shard_cursor).await?);
        }

        Ok(Self {
            segment_path,
            shards,
            shard_index: 0,
        })
    }

    /// Next event in round-robin shard order, or `None` when every shard
    /// is exhausted. No cross-shard ordering is implied.
    pub async fn get_change(&mut self) -> Result<Option<ChangeFeedEvent>, FeedError> {
        let mut scanned = 0;
        while scanned < self.shards.len() {
            let index = self.shard_index;
            self.shard_index = (self.shard_index + 1) % self.shards.len();
            scanned += 1;

            if let Some(event) = self.shards[index].get_change().await? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    pub fn has_next(&self) -> bool {
        self.shards.iter().any(Shard::has_next)
    }

    /// Position across all shards that have one.
    pub fn cursor(&self) -> SegmentCursor {
        SegmentCursor {
            segment_path: self.segment_path.clone(),
            shard_cursors: self.shards.iter().filter_map(Shard::cursor).collect(),
        }
    }
}

/// Manifest shard paths are prefixed with the container name; listing and
/// download paths are container-relative.
fn strip_container_prefix(path: &str) -> &str {
    match path.split_once('/') {
        Some((_, rest)) => rest,
        None => path,
    }
}
