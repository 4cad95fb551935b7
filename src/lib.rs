//! Resumable reader for Avro-encoded, time-partitioned change feeds in
//! blob storage.
//!
//! The feed is organized as a hierarchy of hour-aligned segments, each
//! fanned out over shards, each shard an ordered sequence of Avro object
//! container blobs (chunks). [`ChangeFeed`] walks that hierarchy lazily and
//! can serialize its exact position as an opaque continuation token at any
//! point between events; [`ChangeFeed::resume`] picks up at the next
//! undelivered event.
//!
//! ```no_run
//! use std::sync::Arc;
//! use blobfeed::{ChangeFeed, ChangeFeedOptions, InMemoryContainer};
//!
//! # async fn example() -> Result<(), blobfeed::FeedError> {
//! let container = Arc::new(InMemoryContainer::new(
//!     "https://acct.blob.example.net/$blobchangefeed",
//! ));
//! let mut feed = ChangeFeed::open(container, ChangeFeedOptions::new()).await?;
//! while let Some(event) = feed.next_event().await? {
//!     println!("{:?} {:?}", event.schema_name, event.event_time);
//! }
//! let token = feed.continuation_token()?;
//! # let _ = token;
//! # Ok(())
//! # }
//! ```

pub mod avro;
pub mod error;
pub mod feed;
pub mod source;

pub use error::{CursorError, DecodeError, FeedError, SchemaError, SourceError};
pub use feed::{
    ChangeFeed, ChangeFeedCursor, ChangeFeedEvent, ChangeFeedOptions, SegmentCursor, ShardCursor,
    CHANGE_FEED_CONTAINER_NAME, CURSOR_VERSION,
};
pub use source::{BlobContainer, ByteRange, ContainerRef, InMemoryContainer};
