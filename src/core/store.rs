//! Store traits: the document store boundary consumed by repositories

use crate::core::context::Context;
use crate::core::error::StoreError;
use crate::core::filter::{CompiledFilter, SortOrder};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A schema-flexible record, with its identifier under the `id` key
///
/// Backends translate to their native representation (MongoDB keeps the
/// identifier in `_id`).
pub type Document = Map<String, Value>;

/// A named collection of documents
///
/// Every method receives the caller's [`Context`] and must run its I/O through
/// [`Context::run`] so that cancellation and deadlines abort the network call.
/// A single `find_one_and_upsert` on one identifier must be atomic at the store;
/// nothing else is required to be.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Collection name, for diagnostics
    fn name(&self) -> &str;

    /// Count documents matching `filter`
    async fn count(&self, ctx: &Context, filter: &CompiledFilter) -> Result<u64, StoreError>;

    /// Fetch matching documents in `sort` order, skipping `skip` and returning at most `limit`
    async fn find(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
        sort: &SortOrder,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Document>, StoreError>;

    /// Fetch the first matching document, if any
    async fn find_one(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
    ) -> Result<Option<Document>, StoreError>;

    /// Insert a new document; fails with [`StoreError::DuplicateKey`] if its id exists
    async fn insert_one(&self, ctx: &Context, document: Document) -> Result<(), StoreError>;

    /// Replace the matching document, inserting it when none matches, and
    /// return the document as stored after the write
    async fn find_one_and_upsert(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
        replacement: Document,
    ) -> Result<Document, StoreError>;

    /// Remove the matching document, returning it if one existed
    async fn find_one_and_delete(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
    ) -> Result<Option<Document>, StoreError>;
}

/// A store handing out collection accessors
///
/// Implementations share one pooled client; accessors are cheap to create.
pub trait DocumentStore: Send + Sync {
    type Collection: DocumentCollection + 'static;

    fn collection(&self, name: &str) -> Self::Collection;
}
