//! Avro schema parsing into a decoder tree.
//!
//! Change feed chunks carry their schema as JSON in the container header.
//! This module builds an immutable [`AvroType`] tree from that JSON once;
//! decoding then recurses over the tree with no code generation step.
//!
//! Only the subset the change feed writes is accepted: the eight primitives,
//! `enum`, `union` (as an array of schemas), `map`, and `record`. The
//! `array` and `fixed` complex types and the `aliases` attribute are
//! rejected at build time.

use serde_json::{Map, Value};

use crate::error::SchemaError;

/// The eight Avro primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
}

/// A record schema: name plus fields in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    /// The record's schema name, used to tag decoded events.
    pub name: String,
    /// Field name and schema, in the order fields are encoded.
    pub fields: Vec<(String, AvroType)>,
}

/// A node in the decoder tree built from an Avro JSON schema.
///
/// Closed sum type: every decode dispatch is an exhaustive match.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroType {
    Primitive(Primitive),
    /// Symbol table, in declared order.
    Enum(Vec<String>),
    /// Member schemas, in declared order. Members may not themselves be unions.
    Union(Vec<AvroType>),
    /// Value schema; keys are always strings.
    Map(Box<AvroType>),
    Record(RecordType),
}

/// Parse an Avro JSON schema string into a decoder tree.
pub fn parse_schema(json: &str) -> Result<AvroType, SchemaError> {
    let value: Value = serde_json::from_str(json)?;
    AvroType::from_json(&value)
}

impl AvroType {
    /// Build a decoder tree from a parsed JSON schema value.
    ///
    /// A bare string names a primitive, an array of schemas builds a union,
    /// and an object dispatches on its `type` attribute.
    pub fn from_json(schema: &Value) -> Result<Self, SchemaError> {
        match schema {
            Value::String(name) => Self::from_primitive_name(name),
            Value::Array(members) => Self::from_union(members),
            Value::Object(obj) => Self::from_object(obj),
            other => Err(SchemaError::UnknownType(other.to_string())),
        }
    }

    fn from_primitive_name(name: &str) -> Result<Self, SchemaError> {
        let primitive = match name {
            "null" => Primitive::Null,
            "boolean" => Primitive::Boolean,
            "int" => Primitive::Int,
            "long" => Primitive::Long,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            "bytes" => Primitive::Bytes,
            "string" => Primitive::String,
            other => return Err(SchemaError::UnknownType(other.to_string())),
        };
        Ok(AvroType::Primitive(primitive))
    }

    fn from_union(members: &[Value]) -> Result<Self, SchemaError> {
        let mut types = Vec::with_capacity(members.len());
        for member in members {
            let member_type = AvroType::from_json(member)?;
            // Unions may not immediately contain other unions.
            if matches!(member_type, AvroType::Union(_)) {
                return Err(SchemaError::Unsupported(
                    "union directly containing another union".to_string(),
                ));
            }
            types.push(member_type);
        }
        Ok(AvroType::Union(types))
    }

    fn from_object(obj: &Map<String, Value>) -> Result<Self, SchemaError> {
        let type_name = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(SchemaError::MissingAttribute {
                kind: "object",
                attribute: "type",
            })?;

        // Primitives can be spelled as objects too: {"type": "string"}.
        if let Ok(primitive) = Self::from_primitive_name(type_name) {
            return Ok(primitive);
        }

        match type_name {
            "record" => Self::from_record(obj),
            "enum" => Self::from_enum(obj),
            "map" => {
                let values = obj.get("values").ok_or(SchemaError::MissingAttribute {
                    kind: "map",
                    attribute: "values",
                })?;
                Ok(AvroType::Map(Box::new(AvroType::from_json(values)?)))
            }
            // Not written by the change feed; reject rather than half-support.
            other @ ("array" | "fixed") => {
                Err(SchemaError::Unsupported(format!("Avro type '{other}'")))
            }
            other => Err(SchemaError::UnknownType(other.to_string())),
        }
    }

    fn from_record(obj: &Map<String, Value>) -> Result<Self, SchemaError> {
        if obj.contains_key("aliases") {
            return Err(SchemaError::Unsupported(
                "record 'aliases' attribute".to_string(),
            ));
        }
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or(SchemaError::MissingAttribute {
                kind: "record",
                attribute: "name",
            })?;
        let fields_json = obj
            .get("fields")
            .and_then(Value::as_array)
            .ok_or(SchemaError::MissingAttribute {
                kind: "record",
                attribute: "fields",
            })?;

        let mut fields = Vec::with_capacity(fields_json.len());
        for field in fields_json {
            let field_name = field
                .get("name")
                .and_then(Value::as_str)
                .ok_or(SchemaError::MissingAttribute {
                    kind: "field",
                    attribute: "name",
                })?;
            let field_type = field.get("type").ok_or(SchemaError::MissingAttribute {
                kind: "field",
                attribute: "type",
            })?;
            fields.push((field_name.to_string(), AvroType::from_json(field_type)?));
        }

        Ok(AvroType::Record(RecordType {
            name: name.to_string(),
            fields,
        }))
    }

    fn from_enum(obj: &Map<String, Value>) -> Result<Self, SchemaError> {
        if obj.contains_key("aliases") {
            return Err(SchemaError::Unsupported(
                "enum 'aliases' attribute".to_string(),
            ));
        }
        let symbols_json = obj
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or(SchemaError::MissingAttribute {
                kind: "enum",
                attribute: "symbols",
            })?;

        let mut symbols = Vec::with_capacity(symbols_json.len());
        for symbol in symbols_json {
            let symbol = symbol.as_str().ok_or(SchemaError::MissingAttribute {
                kind: "enum",
                attribute: "symbols",
            })?;
            symbols.push(symbol.to_string());
        }
        Ok(AvroType::Enum(symbols))
    }
}
