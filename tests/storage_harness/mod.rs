//! Shared test harness for storage backend testing
//!
//! Provides `TestRecord`, an entity whose fields cover every `FieldKind`,
//! helpers for creating test data, and fake collections that fail or stall
//! for exercising error paths. [`LogCapture`] records log events for assertions.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//! ```

#![allow(dead_code)]

pub mod log_capture;
#[macro_use]
pub mod repository_tests;

pub use log_capture::{CapturedEvent, LogCapture};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use docrepo::core::context::Context;
use docrepo::core::error::StoreError;
use docrepo::core::filter::{CompiledFilter, SortOrder};
use docrepo::core::query::Page;
use docrepo::core::repository::{EntityRepository, Repository};
use docrepo::core::store::{Document, DocumentCollection};
use docrepo::observe::RecordingTracer;

// ---------------------------------------------------------------------------
// TestRecord: covers every FieldKind
// ---------------------------------------------------------------------------

/// A test entity with fields spanning all `FieldKind` variants.
///
/// Fields:
/// - `name`: Text (searchable)
/// - `email`: Keyword (searchable)
/// - `age`: Number (integer)
/// - `score`: Number (float)
/// - `active`: Boolean
/// - `created_at`: Timestamp
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub score: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

docrepo::impl_entity!(
    TestRecord,
    collection: "test_records",
    repository: "test_record_repository",
    fields: {
        "name" => Text,
        "email" => Keyword,
        "age" => Number,
        "score" => Number,
        "active" => Boolean,
        "created_at" => Timestamp,
    },
    search: ["name", "email"],
);

/// Create a test record with the given fields
pub fn create_test_record(id: &str, name: &str, email: &str, age: i64, active: bool) -> TestRecord {
    TestRecord {
        id: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        age,
        score: age as f64 / 10.0,
        active,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    }
}

/// The `i`-th record of a numbered series; ids sort in series order
pub fn numbered(i: usize) -> TestRecord {
    create_test_record(
        &format!("rec-{:03}", i),
        &format!("Record {}", i),
        &format!("user{}@test.com", i),
        (i % 5) as i64 * 10,
        i % 2 == 0,
    )
}

/// Create `n` numbered records through `repo`
pub async fn seed<R: Repository<TestRecord> + ?Sized>(repo: &R, n: usize) -> Vec<TestRecord> {
    let ctx = Context::new();
    let mut created = Vec::with_capacity(n);
    for i in 0..n {
        created.push(repo.create(&ctx, numbered(i)).await.unwrap());
    }
    created
}

/// Ids of a page's items, in page order
pub fn ids(page: &Page<TestRecord>) -> Vec<String> {
    page.items.iter().map(|r| r.id.clone()).collect()
}

/// Repository over `collection` recording its spans
pub fn traced_repository<C: DocumentCollection>(
    collection: C,
) -> (EntityRepository<TestRecord, C>, RecordingTracer) {
    let tracer = RecordingTracer::new();
    let repo = EntityRepository::new(collection).with_tracer(Arc::new(tracer.clone()));
    (repo, tracer)
}

/// Build a document from a JSON object literal
pub fn document(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

// ---------------------------------------------------------------------------
// Fake collections
// ---------------------------------------------------------------------------

/// A collection whose store is unreachable; counts how often it was called
#[derive(Clone, Default)]
pub struct FailingCollection {
    calls: Arc<AtomicUsize>,
}

impl FailingCollection {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn fail<T>(&self, ctx: &Context) -> Result<T, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ctx.run(async {
            let refused =
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
            Err(StoreError::unavailable_with("no reachable servers", refused))
        })
        .await
    }
}

#[async_trait]
impl DocumentCollection for FailingCollection {
    fn name(&self) -> &str {
        "failing"
    }

    async fn count(&self, ctx: &Context, _: &CompiledFilter) -> Result<u64, StoreError> {
        self.fail(ctx).await
    }

    async fn find(
        &self,
        ctx: &Context,
        _: &CompiledFilter,
        _: &SortOrder,
        _: u64,
        _: u64,
    ) -> Result<Vec<Document>, StoreError> {
        self.fail(ctx).await
    }

    async fn find_one(
        &self,
        ctx: &Context,
        _: &CompiledFilter,
    ) -> Result<Option<Document>, StoreError> {
        self.fail(ctx).await
    }

    async fn insert_one(&self, ctx: &Context, _: Document) -> Result<(), StoreError> {
        self.fail(ctx).await
    }

    async fn find_one_and_upsert(
        &self,
        ctx: &Context,
        _: &CompiledFilter,
        _: Document,
    ) -> Result<Document, StoreError> {
        self.fail(ctx).await
    }

    async fn find_one_and_delete(
        &self,
        ctx: &Context,
        _: &CompiledFilter,
    ) -> Result<Option<Document>, StoreError> {
        self.fail(ctx).await
    }
}

/// A collection whose store never answers
#[derive(Clone, Default)]
pub struct StalledCollection;

impl StalledCollection {
    async fn stall<T>(&self, ctx: &Context) -> Result<T, StoreError> {
        ctx.run(futures::future::pending()).await
    }
}

#[async_trait]
impl DocumentCollection for StalledCollection {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn count(&self, ctx: &Context, _: &CompiledFilter) -> Result<u64, StoreError> {
        self.stall(ctx).await
    }

    async fn find(
        &self,
        ctx: &Context,
        _: &CompiledFilter,
        _: &SortOrder,
        _: u64,
        _: u64,
    ) -> Result<Vec<Document>, StoreError> {
        self.stall(ctx).await
    }

    async fn find_one(
        &self,
        ctx: &Context,
        _: &CompiledFilter,
    ) -> Result<Option<Document>, StoreError> {
        self.stall(ctx).await
    }

    async fn insert_one(&self, ctx: &Context, _: Document) -> Result<(), StoreError> {
        self.stall(ctx).await
    }

    async fn find_one_and_upsert(
        &self,
        ctx: &Context,
        _: &CompiledFilter,
        _: Document,
    ) -> Result<Document, StoreError> {
        self.stall(ctx).await
    }

    async fn find_one_and_delete(
        &self,
        ctx: &Context,
        _: &CompiledFilter,
    ) -> Result<Option<Document>, StoreError> {
        self.stall(ctx).await
    }
}
