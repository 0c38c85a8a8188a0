//! Entity trait defining what a repository needs to know about a record type

use crate::core::field::{self, FieldDef, FieldKind};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Base trait for every record type stored through a repository.
///
/// An entity is a serde-mappable document with a unique, opaque string
/// identifier serialized under the `id` key. It declares:
/// - the collection it lives in
/// - the repository name used in spans, logs and errors
/// - the fields callers may filter and sort on
/// - the fields free-text search expands across
///
/// Identifier uniqueness is enforced by the store, not by this trait.
///
/// Most entities implement this through [`impl_entity!`](crate::impl_entity).
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection holding this entity's documents (e.g., "products")
    fn collection_name() -> &'static str;

    /// Name of the repository serving this entity (e.g., "product_repository")
    fn repository_name() -> &'static str;

    /// Get the unique identifier for this entity instance
    fn id(&self) -> &str;

    /// Fields that can be filtered and sorted on (`id` is always implied)
    fn fields() -> &'static [FieldDef];

    /// Fields free-text search matches against, case-insensitively
    fn searchable_fields() -> &'static [&'static str];

    /// Resolve the kind of a declared field
    fn field_kind(name: &str) -> Option<FieldKind> {
        field::lookup(Self::fields(), name)
    }
}
