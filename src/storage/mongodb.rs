//! MongoDB storage backend using the official MongoDB async driver.
//!
//! Provides [`MongoStore`] and [`MongoCollection`], a [`DocumentStore`] backed
//! by a `mongodb::Database`.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! docrepo = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! MongoDB uses a **collection-per-entity-type** pattern. Each repository
//! operates on a collection named after `T::collection_name()` (e.g.,
//! "products", "orders"). The driver's client is pooled and cheap to clone, so
//! collection handles are created freely.
//!
//! # Serialization strategy
//!
//! Documents cross the boundary as `serde_json` objects and are converted to
//! BSON documents. The `id` field is mapped to MongoDB's `_id` convention, both
//! in stored documents and in compiled filters and sort keys.

use crate::config::MongoConfig;
use crate::core::context::Context;
use crate::core::error::StoreError;
use crate::core::field::ID_FIELD;
use crate::core::filter::{CompiledFilter, FilterExpr, SortOrder};
use crate::core::query::SortDirection;
use crate::core::store::{self, DocumentCollection, DocumentStore};
use anyhow::anyhow;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind as MongoErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Database};
use serde_json::Value;

/// Server error code for a unique index violation
const DUPLICATE_KEY: i32 = 11000;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Convert a JSON document into a BSON Document,
/// renaming `id` → `_id` for MongoDB convention.
fn json_to_document(json: store::Document) -> Result<Document, StoreError> {
    let bson_val = mongodb::bson::to_bson(&Value::Object(json))
        .map_err(|e| StoreError::unrepresentable("Failed to convert JSON to BSON", e))?;

    let mut doc = match bson_val {
        Bson::Document(d) => d,
        other => {
            return Err(StoreError::unrepresentable(
                "Expected BSON document, got non-object",
                format!("{:?}", other.element_type()),
            ));
        }
    };

    // MongoDB convention: rename id → _id
    if let Some(id) = doc.remove(ID_FIELD) {
        doc.insert("_id", id);
    }

    Ok(doc)
}

/// Convert a BSON Document back into a JSON document,
/// renaming `_id` → `id` for domain entity convention.
fn document_to_json(mut doc: Document) -> Result<store::Document, StoreError> {
    // MongoDB convention: rename _id → id
    if let Some(id) = doc.remove("_id") {
        doc.insert(ID_FIELD, id);
    }

    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::unavailable("Expected JSON object from BSON document")),
    }
}

fn json_to_bson(value: &Value) -> Result<Bson, StoreError> {
    mongodb::bson::to_bson(value)
        .map_err(|e| StoreError::unrepresentable("Failed to convert filter value to BSON", e))
}

fn field_name(field: &str) -> &str {
    if field == ID_FIELD { "_id" } else { field }
}

/// Translate a compiled filter into a MongoDB query document
fn filter_to_bson(expr: &FilterExpr) -> Result<Document, StoreError> {
    Ok(match expr {
        FilterExpr::All => doc! {},
        FilterExpr::And(clauses) => doc! { "$and": clauses_to_bson(clauses)? },
        FilterExpr::Or(clauses) => doc! { "$or": clauses_to_bson(clauses)? },
        FilterExpr::Eq { field, value } => {
            doc! { field_name(field): { "$eq": json_to_bson(value)? } }
        }
        FilterExpr::Pattern { field, literal } => doc! {
            field_name(field): { "$regex": regex::escape(literal), "$options": "i" }
        },
        FilterExpr::Range { field, min, max } => {
            let mut bounds = Document::new();
            if let Some(min) = min {
                bounds.insert("$gte", json_to_bson(min)?);
            }
            if let Some(max) = max {
                bounds.insert("$lte", json_to_bson(max)?);
            }
            doc! { field_name(field): bounds }
        }
        FilterExpr::In { field, values } => {
            let values = values.iter().map(json_to_bson).collect::<Result<Vec<_>, _>>()?;
            doc! { field_name(field): { "$in": values } }
        }
    })
}

fn clauses_to_bson(clauses: &[FilterExpr]) -> Result<Vec<Bson>, StoreError> {
    clauses
        .iter()
        .map(|clause| filter_to_bson(clause).map(Bson::Document))
        .collect()
}

/// Translate a sort order into a MongoDB sort document, keys in order
fn sort_to_bson(sort: &SortOrder) -> Document {
    let mut doc = Document::new();
    for key in sort.keys() {
        let direction = match key.direction {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        };
        doc.insert(field_name(&key.field), direction);
    }
    doc
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        MongoErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        MongoErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn map_error(action: &str, id: Option<&str>, err: mongodb::error::Error) -> StoreError {
    match id {
        Some(id) if is_duplicate_key(&err) => StoreError::DuplicateKey { id: id.to_string() },
        _ => StoreError::unavailable_with(format!("Failed to {}", action), err),
    }
}

fn replacement_id(doc: &Document) -> Option<String> {
    doc.get_str("_id").ok().map(str::to_string)
}

// ---------------------------------------------------------------------------
// MongoStore
// ---------------------------------------------------------------------------

/// Document store backed by a MongoDB database.
///
/// # Example
///
/// ```rust,ignore
/// use docrepo::storage::MongoStore;
///
/// let store = MongoStore::connect(&config.mongodb.unwrap()).await?;
/// let products: ProductRepository<_> = EntityRepository::from_store(&store, &config);
/// ```
#[derive(Clone, Debug)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Create a new `MongoStore` with the given database handle.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Connect a pooled client and select the configured database.
    pub async fn connect(config: &MongoConfig) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(&config.uri)
            .await
            .map_err(|e| anyhow!("Failed to connect to MongoDB at {}: {}", config.uri, e))?;
        tracing::info!(database = %config.database, "Connected to MongoDB");
        Ok(Self::new(client.database(&config.database)))
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }
}

impl DocumentStore for MongoStore {
    type Collection = MongoCollection;

    fn collection(&self, name: &str) -> MongoCollection {
        MongoCollection {
            name: name.to_string(),
            inner: self.database.collection(name),
        }
    }
}

/// One MongoDB collection
#[derive(Clone, Debug)]
pub struct MongoCollection {
    name: String,
    inner: mongodb::Collection<Document>,
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count(&self, ctx: &Context, filter: &CompiledFilter) -> Result<u64, StoreError> {
        let query = filter_to_bson(filter.expr())?;
        ctx.run(async {
            self.inner
                .count_documents(query)
                .await
                .map_err(|e| map_error("count documents", None, e))
        })
        .await
    }

    async fn find(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
        sort: &SortOrder,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<store::Document>, StoreError> {
        let query = filter_to_bson(filter.expr())?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        ctx.run(async {
            let cursor = self
                .inner
                .find(query)
                .sort(sort_to_bson(sort))
                .skip(skip)
                .limit(limit)
                .await
                .map_err(|e| map_error("find documents", None, e))?;

            let docs: Vec<Document> = cursor
                .try_collect()
                .await
                .map_err(|e| map_error("collect documents", None, e))?;

            docs.into_iter().map(document_to_json).collect()
        })
        .await
    }

    async fn find_one(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
    ) -> Result<Option<store::Document>, StoreError> {
        let query = filter_to_bson(filter.expr())?;
        ctx.run(async {
            let found = self
                .inner
                .find_one(query)
                .await
                .map_err(|e| map_error("find document", None, e))?;
            found.map(document_to_json).transpose()
        })
        .await
    }

    async fn insert_one(&self, ctx: &Context, document: store::Document) -> Result<(), StoreError> {
        let doc = json_to_document(document)?;
        let id = replacement_id(&doc);
        ctx.run(async {
            self.inner
                .insert_one(doc)
                .await
                .map_err(|e| map_error("insert document", id.as_deref(), e))?;
            Ok(())
        })
        .await
    }

    async fn find_one_and_upsert(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
        replacement: store::Document,
    ) -> Result<store::Document, StoreError> {
        let query = filter_to_bson(filter.expr())?;
        let doc = json_to_document(replacement)?;
        let id = replacement_id(&doc);
        ctx.run(async {
            let stored = self
                .inner
                .find_one_and_replace(query, doc)
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await
                .map_err(|e| map_error("upsert document", id.as_deref(), e))?;

            match stored {
                Some(doc) => document_to_json(doc),
                None => Err(StoreError::unavailable("upsert returned no document")),
            }
        })
        .await
    }

    async fn find_one_and_delete(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
    ) -> Result<Option<store::Document>, StoreError> {
        let query = filter_to_bson(filter.expr())?;
        ctx.run(async {
            let removed = self
                .inner
                .find_one_and_delete(query)
                .await
                .map_err(|e| map_error("delete document", None, e))?;
            removed.map(document_to_json).transpose()
        })
        .await
    }
}
