//! Avro object container reading with exact resumption positions.
//!
//! A chunk blob is an Avro Object Container File: magic bytes, a metadata
//! map carrying the schema JSON and codec name, a 16-byte sync marker, then
//! blocks of object count, byte size, the encoded objects, and a trailing
//! sync marker.
//!
//! [`AvroReader`] iterates objects one at a time and continuously tracks
//! `block_offset` (absolute blob offset of the current block) and
//! `object_index` (objects already consumed within that block), reflecting
//! the position *after* the most recently completed decode. Seeding a new
//! reader with a recorded `(block_offset, object_index)` pair resumes
//! decoding at exactly the next undelivered object.

use bytes::Bytes;

use crate::error::{DecodeError, FeedError, SchemaError};

use super::decode::{read_fixed, read_long, read_map, read_string, AvroValue};
use super::schema::{parse_schema, AvroType};

/// Magic bytes opening an Avro Object Container File: "Obj" + version 1.
pub const AVRO_MAGIC: [u8; 4] = [b'O', b'b', b'j', 0x01];

/// Size of the sync marker separating blocks.
pub const SYNC_MARKER_SIZE: usize = 16;

const AVRO_SCHEMA_KEY: &str = "avro.schema";
const AVRO_CODEC_KEY: &str = "avro.codec";

/// Parsed container header: decoder tree, sync marker, and header size.
#[derive(Debug, Clone)]
pub struct AvroHeader {
    /// Decoder tree built from the `avro.schema` metadata entry.
    pub object_type: AvroType,
    /// Sync marker trailing every block.
    pub sync_marker: [u8; 16],
    /// Offset of the first block, i.e. total header size in bytes.
    pub header_size: u64,
}

impl AvroHeader {
    /// Parse a container header from the leading bytes of a blob.
    ///
    /// Fails with [`DecodeError::UnexpectedEof`] when `bytes` is too short
    /// to cover the whole header; callers fetching ranged reads can retry
    /// with a longer prefix.
    pub fn parse(bytes: &[u8]) -> Result<Self, FeedError> {
        let mut cursor = bytes;
        let before = cursor.len();

        let magic = read_fixed(&mut cursor, AVRO_MAGIC.len()).map_err(FeedError::from)?;
        if magic != AVRO_MAGIC {
            return Err(DecodeError::InvalidMagic.into());
        }

        let metadata = read_map(&mut cursor, read_string).map_err(FeedError::from)?;

        // Change feed chunks are always uncompressed.
        if let Some(codec) = metadata.get(AVRO_CODEC_KEY) {
            if codec != "null" {
                return Err(DecodeError::UnsupportedCodec(codec.clone()).into());
            }
        }

        let schema_json =
            metadata
                .get(AVRO_SCHEMA_KEY)
                .ok_or(SchemaError::MissingAttribute {
                    kind: "container metadata",
                    attribute: "avro.schema",
                })?;
        let object_type = parse_schema(schema_json)?;

        let marker = read_fixed(&mut cursor, SYNC_MARKER_SIZE).map_err(FeedError::from)?;
        let mut sync_marker = [0u8; 16];
        sync_marker.copy_from_slice(marker);

        Ok(Self {
            object_type,
            sync_marker,
            header_size: (before - cursor.len()) as u64,
        })
    }
}

/// Lazy, resumable object iterator over one Avro container blob.
///
/// The reader owns the blob bytes from its starting offset onward and
/// decodes objects on demand; no state is shared with sibling readers.
pub struct AvroReader {
    object_type: AvroType,
    sync_marker: [u8; 16],
    /// Blob contents from `base_offset` to the end of the blob.
    data: Bytes,
    /// Next unread byte, relative to `data`.
    pos: usize,
    /// Absolute blob offset of `data[0]`.
    base_offset: u64,
    block_offset: u64,
    object_index: u64,
    items_remaining: u64,
}

impl AvroReader {
    /// Open a reader over a whole blob, positioned at the first object.
    pub fn new(data: Bytes) -> Result<Self, FeedError> {
        let header = AvroHeader::parse(&data)?;
        let pos = header.header_size as usize;
        let mut reader = Self {
            object_type: header.object_type,
            sync_marker: header.sync_marker,
            data,
            pos,
            base_offset: 0,
            block_offset: header.header_size,
            object_index: 0,
            items_remaining: 0,
        };
        reader.begin_block()?;
        Ok(reader)
    }

    /// Resume a reader mid-blob.
    ///
    /// `header_bytes` must cover the container header; `data` must start at
    /// `block_offset` (the start of a block); the first `object_index`
    /// objects of that block are decoded and discarded so the next call to
    /// [`next`](Self::next) produces the first undelivered object.
    pub fn resume(
        header_bytes: &[u8],
        data: Bytes,
        block_offset: u64,
        object_index: u64,
    ) -> Result<Self, FeedError> {
        let header = AvroHeader::parse(header_bytes)?;
        let mut reader = Self {
            object_type: header.object_type,
            sync_marker: header.sync_marker,
            data,
            pos: 0,
            base_offset: block_offset,
            block_offset,
            object_index: 0,
            items_remaining: 0,
        };
        reader.begin_block()?;
        for _ in 0..object_index {
            if reader.items_remaining == 0 {
                return Err(DecodeError::UnexpectedEof.into());
            }
            reader.decode_object()?;
        }
        Ok(reader)
    }

    /// Whether another object can be produced without error.
    pub fn has_next(&self) -> bool {
        self.items_remaining > 0
    }

    /// Absolute blob offset of the current block.
    pub fn block_offset(&self) -> u64 {
        self.block_offset
    }

    /// Objects already consumed within the current block; equivalently, the
    /// index of the next object to be produced.
    pub fn object_index(&self) -> u64 {
        self.object_index
    }

    /// Decode the next object, or return `None` at end of blob.
    ///
    /// Position state is updated only after the decode completes, so a
    /// caller abandoning an in-flight read never observes a torn position.
    pub fn next(&mut self) -> Result<Option<AvroValue>, DecodeError> {
        if !self.has_next() {
            return Ok(None);
        }
        let value = self.decode_object()?;
        if self.items_remaining == 0 {
            self.finish_block()?;
        }
        Ok(Some(value))
    }

    fn decode_object(&mut self) -> Result<AvroValue, DecodeError> {
        let mut cursor = &self.data[self.pos..];
        let before = cursor.len();
        let value = self.object_type.decode(&mut cursor)?;
        self.pos += before - cursor.len();
        self.items_remaining -= 1;
        self.object_index += 1;
        Ok(value)
    }

    /// Position at the start of a block and read its count and size
    /// prefixes. At end of blob, leaves the reader exhausted.
    fn begin_block(&mut self) -> Result<(), DecodeError> {
        self.block_offset = self.base_offset + self.pos as u64;
        self.object_index = 0;
        if self.pos >= self.data.len() {
            self.items_remaining = 0;
            return Ok(());
        }
        let mut cursor = &self.data[self.pos..];
        let before = cursor.len();
        let count = read_long(&mut cursor)?;
        if count > 0 {
            // Byte size of the block; objects are decoded individually.
            let _byte_size = read_long(&mut cursor)?;
        }
        self.pos += before - cursor.len();
        self.items_remaining = count.max(0) as u64;
        Ok(())
    }

    /// Cross the sync marker that closes the just-finished block and open
    /// the next block, if any.
    fn finish_block(&mut self) -> Result<(), DecodeError> {
        let mut cursor = &self.data[self.pos..];
        let marker = read_fixed(&mut cursor, SYNC_MARKER_SIZE)?;
        if marker != self.sync_marker {
            return Err(DecodeError::InvalidSyncMarker(self.block_offset));
        }
        self.pos += SYNC_MARKER_SIZE;
        self.begin_block()
    }
}
