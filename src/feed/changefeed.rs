//! The change feed itself: segment discovery, cursor resolution, and the
//! event iteration loop.

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::{CursorError, FeedError};
use crate::source::ContainerRef;

use super::cursor::{ChangeFeedCursor, CURSOR_VERSION};
use super::event::ChangeFeedEvent;
use super::segment::Segment;
use super::time::{ceil_to_hour, floor_to_hour, host_of, parse_segment_timestamp};

/// Well-known name of the change feed container.
pub const CHANGE_FEED_CONTAINER_NAME: &str = "$blobchangefeed";

const META_SEGMENT_PATH: &str = "meta/segments.json";
const SEGMENT_PREFIX: &str = "idx/segments/";

/// Segments under this year hold initialization records, not events.
const INITIALIZATION_YEAR: i32 = 1601;

/// Time window options for opening a feed.
#[derive(Debug, Clone, Default)]
pub struct ChangeFeedOptions {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl ChangeFeedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive lower bound; floored to the containing hour.
    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Exclusive upper bound; ceiled to the next hour boundary.
    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }
}

/// The watermark blob: the feed's own record of how far its segments are
/// safe to read.
#[derive(Debug, Deserialize)]
struct MetaSegments {
    #[serde(rename = "lastConsumable")]
    last_consumable: DateTime<Utc>,
}

/// A change feed positioned somewhere in its event stream.
///
/// Events are produced by repeated [`next_event`](Self::next_event) calls;
/// a [`continuation_token`](Self::continuation_token) taken between calls
/// resumes at exactly the next undelivered event. Abandoning an in-flight
/// call by dropping its future never corrupts the position.
pub struct ChangeFeed {
    container: ContainerRef,
    /// Years not yet visited, ascending.
    years: VecDeque<i32>,
    /// Segment manifest paths queued within the year being visited.
    segments: VecDeque<String>,
    current_segment: Option<Segment>,
    last_consumable: DateTime<Utc>,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
}

impl ChangeFeed {
    /// Open a feed over a time window.
    pub async fn open(
        container: ContainerRef,
        options: ChangeFeedOptions,
    ) -> Result<Self, FeedError> {
        Self::resolve(container, None, options).await
    }

    /// Resume a feed from a continuation token.
    pub async fn resume(container: ContainerRef, token: &str) -> Result<Self, FeedError> {
        let cursor = ChangeFeedCursor::from_token(token).map_err(FeedError::from)?;
        Self::resolve(container, Some(cursor), ChangeFeedOptions::default()).await
    }

    async fn resolve(
        container: ContainerRef,
        cursor: Option<ChangeFeedCursor>,
        options: ChangeFeedOptions,
    ) -> Result<Self, FeedError> {
        // Validate the cursor against this container before touching
        // storage.
        if let Some(cursor) = &cursor {
            let container_host = host_of(container.url());
            if cursor.url_host != container_host {
                return Err(CursorError::HostMismatch {
                    cursor: cursor.url_host.clone(),
                    container: container_host.to_string(),
                }
                .into());
            }
            if cursor.cursor_version != CURSOR_VERSION {
                return Err(CursorError::UnsupportedVersion(cursor.cursor_version).into());
            }
        }

        // The window comes from the cursor on resume, from options on a
        // fresh open. A cursor's segment path is already hour-aligned.
        let (start, end) = match &cursor {
            Some(cursor) => {
                let segment_path = &cursor.current_segment_cursor.segment_path;
                let start = parse_segment_timestamp(segment_path).ok_or_else(|| {
                    FeedError::InvalidMetadata {
                        path: segment_path.clone(),
                        message: "cursor segment path does not encode a timestamp".to_string(),
                    }
                })?;
                (start, cursor.end_time)
            }
            None => (
                options.start.map(floor_to_hour).unwrap_or(DateTime::UNIX_EPOCH),
                options.end.map(ceil_to_hour),
            ),
        };

        if !container.exists().await? {
            return Err(FeedError::NotEnabled);
        }

        if let Some(end) = end {
            if start >= end {
                return Ok(Self::empty(container, start, Some(end)));
            }
        }

        let watermark = container.download(META_SEGMENT_PATH, None).await?;
        let meta: MetaSegments =
            serde_json::from_slice(&watermark).map_err(|err| FeedError::InvalidMetadata {
                path: META_SEGMENT_PATH.to_string(),
                message: err.to_string(),
            })?;
        let last_consumable = meta.last_consumable;
        debug!(%last_consumable, %start, "resolved change feed window");

        // A watermark at or before a resumed position means the feed's own
        // metadata moved backwards. Surface it rather than replaying.
        if cursor.is_some() && last_consumable <= start {
            return Err(FeedError::InvalidMetadata {
                path: META_SEGMENT_PATH.to_string(),
                message: format!(
                    "lastConsumable {last_consumable} is not past the resumed position {start}"
                ),
            });
        }

        let mut years = list_years(container.as_ref()).await?;
        years.retain(|&year| year >= start.year());

        let mut feed = Self {
            container,
            years: years.into(),
            segments: VecDeque::new(),
            current_segment: None,
            last_consumable,
            start,
            end,
        };

        // Fill the segment queue from the first non-empty year, then open
        // the first segment with the cursor's shard positions.
        let segment_path = loop {
            if let Some(path) = feed.segments.pop_front() {
                break path;
            }
            let Some(year) = feed.years.pop_front() else {
                return Ok(feed);
            };
            feed.segments = feed.list_segments_in_year(year).await?.into();
        };
        let segment_cursor = cursor.as_ref().map(|c| &c.current_segment_cursor);
        feed.current_segment = Some(
            Segment::create(feed.container.clone(), segment_path, segment_cursor).await?,
        );

        Ok(feed)
    }

    fn empty(container: ContainerRef, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self {
        Self {
            container,
            years: VecDeque::new(),
            segments: VecDeque::new(),
            current_segment: None,
            last_consumable: start,
            start,
            end,
        }
    }

    /// Next event in the feed, or `None` when the window is exhausted.
    pub async fn next_event(&mut self) -> Result<Option<ChangeFeedEvent>, FeedError> {
        loop {
            let Some(segment) = self.current_segment.as_mut() else {
                return Ok(None);
            };
            if let Some(event) = segment.get_change().await? {
                return Ok(Some(event));
            }
            if !self.advance_segment().await? {
                return Ok(None);
            }
        }
    }

    /// Read up to `max_events` events.
    pub async fn next_batch(
        &mut self,
        max_events: usize,
    ) -> Result<Vec<ChangeFeedEvent>, FeedError> {
        let mut events = Vec::new();
        while events.len() < max_events {
            match self.next_event().await? {
                Some(event) => events.push(event),
                None => break,
            }
        }
        Ok(events)
    }

    /// Whether more events may be available without waiting.
    pub fn has_next(&self) -> bool {
        self.current_segment.as_ref().is_some_and(Segment::has_next)
            || !self.segments.is_empty()
            || !self.years.is_empty()
    }

    /// Serialize the current position as an opaque continuation token.
    ///
    /// Fails with [`CursorError::NoPosition`] when the feed never opened a
    /// segment (empty window or feed with no data).
    pub fn continuation_token(&self) -> Result<String, FeedError> {
        let segment = self
            .current_segment
            .as_ref()
            .ok_or(CursorError::NoPosition)?;
        let cursor = ChangeFeedCursor::new(
            host_of(self.container.url()).to_string(),
            self.end,
            segment.cursor(),
        );
        Ok(cursor.to_token().map_err(FeedError::from)?)
    }

    /// Move to the next segment in the window. Returns `false` when no
    /// segment remains.
    async fn advance_segment(&mut self) -> Result<bool, FeedError> {
        loop {
            if let Some(path) = self.segments.pop_front() {
                // Later segments always start fresh; only the first
                // segment of a resume carries shard positions.
                self.current_segment =
                    Some(Segment::create(self.container.clone(), path, None).await?);
                return Ok(true);
            }
            let Some(year) = self.years.pop_front() else {
                return Ok(false);
            };
            self.segments = self.list_segments_in_year(year).await?.into();
        }
    }

    /// Segment manifests in `year` whose timestamp lies inside the
    /// effective window `[start, min(last_consumable, end))`.
    async fn list_segments_in_year(&self, year: i32) -> Result<Vec<String>, FeedError> {
        let effective_end = match self.end {
            Some(end) => end.min(self.last_consumable),
            None => self.last_consumable,
        };
        let prefix = format!("{SEGMENT_PREFIX}{year:04}/");
        let mut segments = self.container.list_blobs(&prefix).await?;
        segments.retain(|path| {
            // Skip anything that does not parse as a segment manifest.
            parse_segment_timestamp(path)
                .is_some_and(|time| time >= self.start && time < effective_end)
        });
        Ok(segments)
    }
}

/// Years with segment data, ascending, excluding the initialization year.
async fn list_years(container: &dyn crate::source::BlobContainer) -> Result<Vec<i32>, FeedError> {
    let paths = container.list_blobs(SEGMENT_PREFIX).await?;
    let mut years: Vec<i32> = paths
        .iter()
        .filter_map(|path| {
            path.strip_prefix(SEGMENT_PREFIX)?
                .split('/')
                .next()?
                .parse()
                .ok()
        })
        .filter(|&year| year != INITIALIZATION_YEAR)
        .collect();
    years.dedup();
    Ok(years)
}
