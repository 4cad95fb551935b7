//! Shared fixtures: in-memory change feed containers with Avro chunks.

use std::sync::Arc;

use blobfeed::avro::decode::{encode_string, encode_zigzag};
use blobfeed::avro::AVRO_MAGIC;
use blobfeed::InMemoryContainer;

pub const CONTAINER_URL: &str = "https://testacct.blob.example.net/$blobchangefeed";

pub const SYNC: [u8; 16] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10,
];

const EVENT_SCHEMA: &str = r#"{"type":"record","name":"BlobChangeEvent","fields":[{"name":"eventTime","type":"string"},{"name":"eventType","type":"string"},{"name":"subject","type":"string"}]}"#;

/// Encode one event record.
pub fn event(time: &str, event_type: &str, subject: &str) -> Vec<u8> {
    let mut out = encode_string(time);
    out.extend_from_slice(&encode_string(event_type));
    out.extend_from_slice(&encode_string(subject));
    out
}

/// Shorthand: a created-blob event with a fixed timestamp.
pub fn created(subject: &str) -> Vec<u8> {
    event("2024-03-01T12:30:00Z", "BlobCreated", subject)
}

/// Build an Avro object container file with one block per entry.
pub fn chunk_blob(blocks: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let mut file = Vec::new();
    file.extend_from_slice(&AVRO_MAGIC);

    file.extend_from_slice(&encode_zigzag(1));
    file.extend_from_slice(&encode_string("avro.schema"));
    file.extend_from_slice(&encode_string(EVENT_SCHEMA));
    file.extend_from_slice(&encode_zigzag(0));

    file.extend_from_slice(&SYNC);

    for objects in blocks {
        let data: Vec<u8> = objects.iter().flatten().copied().collect();
        file.extend_from_slice(&encode_zigzag(objects.len() as i64));
        file.extend_from_slice(&encode_zigzag(data.len() as i64));
        file.extend_from_slice(&data);
        file.extend_from_slice(&SYNC);
    }

    file
}

/// Segment manifest path for an hour.
pub fn segment_path(year: i32, month: u32, day: u32, hour: u32) -> String {
    format!("idx/segments/{year:04}/{month:02}/{day:02}/{:04}/meta.json", hour * 100)
}

/// Shard directory path for an hour.
pub fn shard_path(shard: u32, year: i32, month: u32, day: u32, hour: u32) -> String {
    format!("log/{shard:02}/{year:04}/{month:02}/{day:02}/{:04}/", hour * 100)
}

/// A fresh container with a watermark already set.
pub async fn container_with_watermark(last_consumable: &str) -> Arc<InMemoryContainer> {
    let container = Arc::new(InMemoryContainer::new(CONTAINER_URL));
    set_watermark(&container, last_consumable).await;
    container
}

pub async fn set_watermark(container: &InMemoryContainer, last_consumable: &str) {
    container
        .insert(
            "meta/segments.json",
            format!(r#"{{"version":0,"lastConsumable":"{last_consumable}"}}"#),
        )
        .await;
}

/// Write a segment manifest pointing at the given shard paths.
pub async fn add_segment(container: &InMemoryContainer, path: &str, shards: &[&str]) {
    let shard_list: Vec<String> = shards
        .iter()
        .map(|s| format!(r#""$blobchangefeed/{s}""#))
        .collect();
    container
        .insert(
            path,
            format!(r#"{{"chunkFilePaths":[{}]}}"#, shard_list.join(",")),
        )
        .await;
}

/// Subjects of all events remaining in a feed, in delivery order.
pub async fn drain_subjects(feed: &mut blobfeed::ChangeFeed) -> Vec<String> {
    let mut subjects = Vec::new();
    while let Some(event) = feed.next_event().await.unwrap() {
        subjects.push(
            event
                .field("subject")
                .and_then(blobfeed::avro::AvroValue::as_str)
                .unwrap()
                .to_string(),
        );
    }
    subjects
}
