//! Change feed event representation.

use chrono::{DateTime, Utc};

use crate::avro::AvroValue;
use crate::error::DecodeError;

const EVENT_TIME_FIELD: &str = "eventTime";

/// One decoded change event.
///
/// Events are schema-driven: fields are kept as decoded Avro values in
/// schema order rather than being projected onto a fixed struct, so schema
/// additions flow through without a crate change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFeedEvent {
    /// Schema name of the record, e.g. `BlobChangeEvent`.
    pub schema_name: String,
    /// Parsed `eventTime` field, when present and well-formed.
    pub event_time: Option<DateTime<Utc>>,
    /// All record fields in schema order.
    pub fields: Vec<(String, AvroValue)>,
}

impl ChangeFeedEvent {
    /// Build an event from a decoded top-level Avro object.
    pub fn from_value(value: AvroValue) -> Result<Self, DecodeError> {
        let AvroValue::Record { name, fields } = value else {
            return Err(DecodeError::NotARecord);
        };

        let event_time = fields
            .iter()
            .find(|(field, _)| field == EVENT_TIME_FIELD)
            .and_then(|(_, value)| value.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        Ok(Self {
            schema_name: name,
            event_time,
            fields,
        })
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&AvroValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}
