//! Schema-driven Avro decoding and resumable object container reading.

pub mod decode;
pub mod reader;
pub mod schema;

pub use decode::{read_long, AvroValue};
pub use reader::{AvroHeader, AvroReader, AVRO_MAGIC, SYNC_MARKER_SIZE};
pub use schema::{parse_schema, AvroType, Primitive, RecordType};
