//! Continuation token serialization.
//!
//! Tokens are JSON with PascalCase keys and are treated as opaque by
//! callers: issued by [`crate::ChangeFeed::continuation_token`], consumed
//! by [`crate::ChangeFeed::resume`]. The layout is versioned; this module
//! reads and writes version 1.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CursorError;

/// Current cursor layout version.
pub const CURSOR_VERSION: i64 = 1;

/// Position within one shard: the chunk being read and the exact object
/// position inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShardCursor {
    /// Shard directory path, container-relative.
    pub shard_path: String,
    /// Absolute blob offset of the Avro block being read.
    pub block_offset: u64,
    /// Objects already consumed within that block.
    pub event_index: u64,
    /// Chunk blob path the offsets refer to.
    pub current_chunk_path: String,
}

/// Position within one segment: the manifest path plus per-shard cursors.
/// The rotation point between shards is not recorded; cross-shard order is
/// unguaranteed, so resumes restart the rotation from the first shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SegmentCursor {
    /// Segment manifest path, container-relative.
    pub segment_path: String,
    /// One cursor per shard that has an open chunk. Shards that produced
    /// nothing yet, or whose listing was empty, are omitted and restart
    /// fresh on resume.
    pub shard_cursors: Vec<ShardCursor>,
}

/// A complete feed position, serializable as an opaque continuation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChangeFeedCursor {
    pub cursor_version: i64,
    /// Host of the account the token was issued against. Resume rejects
    /// tokens from a different account.
    pub url_host: String,
    /// Exclusive end bound of the original request, if one was given.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end_time: Option<DateTime<Utc>>,
    pub current_segment_cursor: SegmentCursor,
}

impl ChangeFeedCursor {
    pub fn new(
        url_host: String,
        end_time: Option<DateTime<Utc>>,
        current_segment_cursor: SegmentCursor,
    ) -> Self {
        Self {
            cursor_version: CURSOR_VERSION,
            url_host,
            end_time,
            current_segment_cursor,
        }
    }

    /// Serialize to an opaque token string.
    pub fn to_token(&self) -> Result<String, CursorError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a token string back into a cursor.
    pub fn from_token(token: &str) -> Result<Self, CursorError> {
        Ok(serde_json::from_str(token)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> ChangeFeedCursor {
        ChangeFeedCursor::new(
            "acct.blob.example.net".to_string(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap()),
            SegmentCursor {
                segment_path: "idx/segments/2024/03/01/1200/meta.json".to_string(),
                shard_cursors: vec![ShardCursor {
                    shard_path: "log/00/2024/03/01/1200/".to_string(),
                    block_offset: 1234,
                    event_index: 2,
                    current_chunk_path: "log/00/2024/03/01/1200/00000.avro".to_string(),
                }],
            },
        )
    }

    #[test]
    fn test_token_roundtrip() {
        let cursor = sample();
        let token = cursor.to_token().unwrap();
        assert_eq!(ChangeFeedCursor::from_token(&token).unwrap(), cursor);
    }

    #[test]
    fn test_token_uses_pascal_case_keys() {
        let token = sample().to_token().unwrap();
        let json: serde_json::Value = serde_json::from_str(&token).unwrap();
        assert_eq!(json["CursorVersion"], 1);
        assert_eq!(json["UrlHost"], "acct.blob.example.net");
        assert!(json["CurrentSegmentCursor"]["SegmentPath"].is_string());
        let shard = &json["CurrentSegmentCursor"]["ShardCursors"][0];
        assert_eq!(shard["BlockOffset"], 1234);
        assert_eq!(shard["EventIndex"], 2);
        assert!(shard["CurrentChunkPath"].is_string());
    }

    #[test]
    fn test_end_time_omitted_when_none() {
        let mut cursor = sample();
        cursor.end_time = None;
        let token = cursor.to_token().unwrap();
        let json: serde_json::Value = serde_json::from_str(&token).unwrap();
        assert!(json.get("EndTime").is_none());
        assert_eq!(ChangeFeedCursor::from_token(&token).unwrap(), cursor);
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(matches!(
            ChangeFeedCursor::from_token("{not a cursor"),
            Err(CursorError::Malformed(_))
        ));
        assert!(matches!(
            ChangeFeedCursor::from_token(r#"{"CursorVersion": 1}"#),
            Err(CursorError::Malformed(_))
        ));
    }
}
