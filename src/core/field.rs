//! Field schema declarations used to validate queries

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Name of the identifier field every entity carries
pub const ID_FIELD: &str = "id";

/// The kind of value stored in a field
///
/// The kind decides which filter operators the compiler accepts for the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text: equality, set membership, substring match
    Text,
    /// Opaque identifiers and codes: equality, set membership, substring match
    Keyword,
    /// Integers and floats: equality, set membership, ranges
    Number,
    Boolean,
    /// RFC 3339 instants: equality, set membership, ranges
    ///
    /// Stored and compared in [`canonical_timestamp`] form, so string order is
    /// time order.
    Timestamp,
}

impl FieldKind {
    pub fn supports_contains(&self) -> bool {
        matches!(self, FieldKind::Text | FieldKind::Keyword)
    }

    pub fn supports_range(&self) -> bool {
        matches!(self, FieldKind::Number | FieldKind::Timestamp)
    }

    /// Check that a scalar value has the shape this kind stores
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Text | FieldKind::Keyword => value.is_string(),
            FieldKind::Timestamp => value.as_str().and_then(canonical_timestamp).is_some(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
        }
    }

    /// The form `value` is stored and compared in
    ///
    /// Timestamps become fixed-width UTC; everything else is returned as is.
    pub fn normalize(&self, value: &Value) -> Value {
        if *self == FieldKind::Timestamp {
            if let Some(canonical) = value.as_str().and_then(canonical_timestamp) {
                return Value::String(canonical);
            }
        }
        value.clone()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Keyword => "keyword",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "timestamp",
        }
    }
}

/// A queryable field declared by an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Rewrite an RFC 3339 instant as UTC with nanosecond precision
///
/// `2024-01-01T01:00:00.5+01:00` becomes `2024-01-01T00:00:00.500000000Z`.
/// Every canonical value has the same width, which keeps lexicographic and
/// chronological order identical for store backends comparing strings.
pub fn canonical_timestamp(text: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|instant| instant.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Look up a field by name, treating `id` as an implicit keyword field
pub fn lookup(fields: &[FieldDef], name: &str) -> Option<FieldKind> {
    if name == ID_FIELD {
        return Some(FieldKind::Keyword);
    }
    fields.iter().find(|f| f.name == name).map(|f| f.kind)
}
