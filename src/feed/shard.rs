//! A shard: an ordered sequence of chunk blobs under one shard directory.

use std::collections::VecDeque;

use tracing::debug;

use crate::error::{CursorError, FeedError};
use crate::source::ContainerRef;

use super::chunk::Chunk;
use super::cursor::ShardCursor;
use super::event::ChangeFeedEvent;

/// One shard with its remaining chunk queue and the chunk currently open.
pub struct Shard {
    container: ContainerRef,
    shard_path: String,
    /// Chunk paths not yet opened, in listing order.
    chunks: VecDeque<String>,
    /// The chunk being read. Kept even when exhausted so the shard still
    /// reports a position; dropping it would make a later resume replay
    /// the whole chunk.
    current_chunk: Option<Chunk>,
}

impl Shard {
    /// Open a shard, optionally resuming at a recorded cursor.
    ///
    /// With a cursor, the listed chunks must still contain the cursor's
    /// chunk; chunks before it are dropped and the cursor's offsets seed
    /// the first open.
    pub async fn create(
        container: ContainerRef,
        shard_path: String,
        shard_cursor: Option<&ShardCursor>,
    ) -> Result<Self, FeedError> {
        let mut chunks: VecDeque<String> =
            container.list_blobs(&shard_path).await?.into();
        debug!(shard = %shard_path, chunks = chunks.len(), "opening shard");

        let (block_offset, event_index) = match shard_cursor {
            Some(cursor) => {
                // Position at the cursor's chunk; a vanished chunk is an
                // error, never a silent restart.
                let index = chunks
                    .iter()
                    .position(|path| *path == cursor.current_chunk_path)
                    .ok_or_else(|| {
                        CursorError::ChunkNotFound(cursor.current_chunk_path.clone())
                    })?;
                chunks.drain(..index);
                (cursor.block_offset, cursor.event_index)
            }
            None => (0, 0),
        };

        let current_chunk = match chunks.pop_front() {
            // An empty listing is legitimate right after an hour flip.
            None => None,
            Some(path) => {
                Some(Chunk::create(container.as_ref(), path, block_offset, event_index).await?)
            }
        };

        Ok(Self {
            container,
            shard_path,
            chunks,
            current_chunk,
        })
    }

    /// Decode the next event, advancing to the next chunk when the current
    /// one is exhausted. Returns `None` when the shard has no events left.
    pub async fn get_change(&mut self) -> Result<Option<ChangeFeedEvent>, FeedError> {
        loop {
            let Some(chunk) = self.current_chunk.as_mut() else {
                return Ok(None);
            };
            if let Some(event) = chunk.get_change()? {
                return Ok(Some(event));
            }
            match self.chunks.pop_front() {
                Some(path) => {
                    self.current_chunk =
                        Some(Chunk::create(self.container.as_ref(), path, 0, 0).await?);
                }
                None => return Ok(None),
            }
        }
    }

    pub fn has_next(&self) -> bool {
        !self.chunks.is_empty()
            || self
                .current_chunk
                .as_ref()
                .is_some_and(Chunk::has_next)
    }

    /// Current position, or `None` when no chunk was ever opened.
    pub fn cursor(&self) -> Option<ShardCursor> {
        self.current_chunk.as_ref().map(|chunk| ShardCursor {
            shard_path: self.shard_path.clone(),
            block_offset: chunk.block_offset(),
            event_index: chunk.event_index(),
            current_chunk_path: chunk.path().to_string(),
        })
    }
}
