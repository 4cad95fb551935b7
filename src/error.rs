//! Error types for change feed reading.
//!
//! Every error propagates synchronously to the immediate caller of the
//! triggering operation; this crate performs no internal retry or
//! suppression. Transient transport failures surface as `SourceError` and
//! retry policy belongs to the caller.

use std::io;
use thiserror::Error;

/// Errors raised while building a decoder tree from an Avro JSON schema.
///
/// Schema building is all-or-nothing: a schema that fails to build leaves
/// no partially constructed decoder behind.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Unknown primitive or complex type name
    #[error("Unexpected Avro type: {0}")]
    UnknownType(String),
    /// A required schema attribute is missing
    #[error("Required attribute '{attribute}' doesn't exist on {kind} schema")]
    MissingAttribute {
        kind: &'static str,
        attribute: &'static str,
    },
    /// A construct this reader deliberately does not support
    #[error("Unsupported Avro construct: {0}")]
    Unsupported(String),
    /// The schema is not valid JSON
    #[error("Invalid schema JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Errors raised while decoding Avro binary data.
///
/// `UnexpectedEof`, `InvalidMagic` and `InvalidSyncMarker` are framing
/// errors: the stream ended short or lost block alignment. All variants are
/// fatal for the current chunk; a failed decode means the decoder and the
/// stream are desynchronized and further reads would be meaningless.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Hit stream end mid-value
    #[error("Unexpected end of stream")]
    UnexpectedEof,
    /// Varint exceeds the representable 64-bit range
    #[error("Integer overflow decoding varint")]
    IntegerOverflow,
    /// A decoded long does not fit in i32 where an int was expected
    #[error("Integer overflow: {0} does not fit in i32")]
    IntOutOfRange(i64),
    /// Boolean byte other than 0 or 1
    #[error("Byte {0} is not a boolean")]
    InvalidBoolean(u8),
    /// Negative length prefix on bytes/string
    #[error("Bytes length was negative: {0}")]
    NegativeLength(i64),
    /// Enum index outside the symbol table
    #[error("Enum index {index} out of range (0..{len})")]
    EnumIndexOutOfRange { index: i32, len: usize },
    /// Union index outside the member list
    #[error("Union index {index} out of range (0..{len})")]
    UnionIndexOutOfRange { index: i32, len: usize },
    /// String is not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// Blob does not start with the Avro object container magic
    #[error("Invalid magic bytes: not an Avro object container")]
    InvalidMagic,
    /// Block trailer does not match the header sync marker
    #[error("Sync marker mismatch in block at offset {0}")]
    InvalidSyncMarker(u64),
    /// Change feed chunks are written uncompressed; anything else is rejected
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),
    /// The top-level decoded object is not a record
    #[error("Top-level Avro object is not a record")]
    NotARecord,
}

/// Errors raised while validating or applying a continuation token.
///
/// These are surfaced verbatim to the caller; a bad cursor must never
/// silently restart the feed from the beginning.
#[derive(Debug, Error)]
pub enum CursorError {
    /// Token was issued against a different storage account
    #[error("Cursor URL host {cursor} does not match container URL host {container}")]
    HostMismatch { cursor: String, container: String },
    /// Token version this reader does not understand
    #[error("Unsupported cursor version: {0}")]
    UnsupportedVersion(i64),
    /// The chunk the token points at no longer exists in the shard listing
    #[error("Chunk {0} not found")]
    ChunkNotFound(String),
    /// Token is not valid cursor JSON
    #[error("Malformed continuation token: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The feed has no current position to serialize
    #[error("Change feed has no current position; cannot issue a continuation token")]
    NoPosition,
}

/// Errors raised by the storage transport.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Blob or prefix not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Storage service failure (HTTP-level, throttling, etc.)
    #[error("Storage service error: {0}")]
    Service(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Top-level error type for change feed operations.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The change feed container does not exist
    #[error("Change feed has not been enabled on this account, or is currently being enabled")]
    NotEnabled,

    /// Transport failure
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Schema build failure
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Binary decode failure
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Continuation token failure
    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    /// A metadata blob (watermark, segment manifest) could not be parsed,
    /// or its contents contradict the feed's own position
    #[error("Invalid metadata in {path}: {message}")]
    InvalidMetadata { path: String, message: String },
}
