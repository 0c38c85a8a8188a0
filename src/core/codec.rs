//! Entity <-> document conversion

use crate::core::entity::Entity;
use crate::core::error::Cause;
use crate::core::field::{FieldKind, ID_FIELD};
use crate::core::store::Document;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Serialize an entity into a document
pub fn encode<T: Serialize>(entity: &T) -> Result<Document, Cause> {
    match serde_json::to_value(entity).map_err(Cause::Encode)? {
        Value::Object(map) => Ok(map),
        other => Err(Cause::NotAnObject {
            found: json_type(&other),
        }),
    }
}

/// Serialize an entity with its declared fields in stored form
///
/// Timestamp fields are rewritten to their canonical fixed-width form, so
/// backends can range-filter and sort them as plain strings.
pub fn encode_entity<T: Entity>(entity: &T) -> Result<Document, Cause> {
    let mut document = encode(entity)?;
    for field in T::fields() {
        if field.kind == FieldKind::Timestamp {
            if let Some(value) = value_at_mut(&mut document, field.name) {
                *value = field.kind.normalize(value);
            }
        }
    }
    Ok(document)
}

fn value_at_mut<'a>(document: &'a mut Document, path: &str) -> Option<&'a mut Value> {
    let mut parts = path.split('.');
    let mut current = document.get_mut(parts.next()?)?;
    for part in parts {
        current = current.get_mut(part)?;
    }
    Some(current)
}

/// Deserialize a document into an entity, naming the document on failure
pub fn decode<T: DeserializeOwned>(document: Document) -> Result<T, Cause> {
    let id = document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string);
    serde_json::from_value(Value::Object(document)).map_err(|source| Cause::Decode { id, source })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
