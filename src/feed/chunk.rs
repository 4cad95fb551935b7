//! A single chunk: one Avro container blob within a shard.

use bytes::Bytes;
use tracing::debug;

use crate::avro::AvroReader;
use crate::error::{DecodeError, FeedError};
use crate::source::{BlobContainer, ByteRange};

use super::event::ChangeFeedEvent;

/// Initial header fetch size when resuming mid-blob. Headers are small;
/// one read normally suffices.
const HEADER_READ_SIZE: u64 = 64 * 1024;

/// One open chunk blob with its position state.
pub struct Chunk {
    chunk_path: String,
    reader: AvroReader,
}

impl Chunk {
    /// Open a chunk, either fresh (`block_offset == 0`) or resumed at a
    /// recorded position.
    pub async fn create(
        container: &dyn BlobContainer,
        chunk_path: String,
        block_offset: u64,
        event_index: u64,
    ) -> Result<Self, FeedError> {
        debug!(chunk = %chunk_path, block_offset, event_index, "opening chunk");

        let reader = if block_offset == 0 {
            let data = container.download(&chunk_path, None).await?;
            AvroReader::new(data)?
        } else {
            let header = fetch_header(container, &chunk_path).await?;
            let data = container
                .download(&chunk_path, Some(ByteRange::from(block_offset)))
                .await?;
            AvroReader::resume(&header, data, block_offset, event_index)?
        };

        Ok(Self { chunk_path, reader })
    }

    /// Decode the next event, or `None` at end of chunk.
    pub fn get_change(&mut self) -> Result<Option<ChangeFeedEvent>, FeedError> {
        match self.reader.next()? {
            Some(value) => Ok(Some(ChangeFeedEvent::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn has_next(&self) -> bool {
        self.reader.has_next()
    }

    pub fn block_offset(&self) -> u64 {
        self.reader.block_offset()
    }

    pub fn event_index(&self) -> u64 {
        self.reader.object_index()
    }

    pub fn path(&self) -> &str {
        &self.chunk_path
    }
}

/// Fetch enough of the blob's prefix to parse the container header,
/// doubling the read size until the parse no longer runs off the end.
async fn fetch_header(container: &dyn BlobContainer, path: &str) -> Result<Bytes, FeedError> {
    let mut size = HEADER_READ_SIZE;
    loop {
        let bytes = container
            .download(path, Some(ByteRange::new(0, size)))
            .await?;
        let truncated = bytes.len() as u64 == size;
        match crate::avro::AvroHeader::parse(&bytes) {
            Ok(_) => return Ok(bytes),
            Err(FeedError::Decode(DecodeError::UnexpectedEof)) if truncated => {
                size *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}
