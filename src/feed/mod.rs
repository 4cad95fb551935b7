//! Change feed reading: segments, shards, chunks, and cursors.

pub mod changefeed;
pub mod chunk;
pub mod cursor;
pub mod event;
pub mod segment;
pub mod shard;
pub mod time;

pub use changefeed::{ChangeFeed, ChangeFeedOptions, CHANGE_FEED_CONTAINER_NAME};
pub use cursor::{ChangeFeedCursor, SegmentCursor, ShardCursor, CURSOR_VERSION};
pub use event::ChangeFeedEvent;
