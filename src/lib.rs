//! # docrepo
//!
//! Generic, paginated and instrumented repositories over document stores.
//!
//! ## Features
//!
//! - **One generic repository**: `EntityRepository<T, C>` serves any entity type
//!   over any [`DocumentCollection`](core::store::DocumentCollection)
//! - **Query engine**: page/sort/filter/search specifications compile into a
//!   backend-neutral predicate tree, validated against each entity's field schema
//! - **Pagination**: one skip/limit/count algorithm shared by every repository
//! - **Observability**: every operation runs inside a span and emits one
//!   structured log event, through the `tracing` ecosystem
//! - **Cancellation**: an explicit [`Context`](core::context::Context) carries
//!   cancellation and deadlines down to every store call
//! - **Backends**: in-memory (default) and MongoDB (`mongodb_backend` feature)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docrepo::prelude::*;
//!
//! let config = RepositoryConfig::from_yaml_file("docrepo.yaml")?;
//! let store = InMemoryStore::new();
//! let products: ProductRepository<_> = EntityRepository::from_store(&store, &config);
//!
//! let ctx = Context::new();
//! products.create(&ctx, Product::new("Lamp", "Brass desk lamp", 49.0)).await?;
//!
//! let page = products
//!     .search(&ctx, "lamp", &QuerySpec::new(1, 10).sorted_by(Sort::desc("price")))
//!     .await?;
//! println!("{} of {} lamps", page.len(), page.total_count);
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod observe;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        context::Context,
        entity::Entity,
        error::{ErrorKind, Operation, RepositoryError},
        field::{FieldDef, FieldKind},
        query::{
            FieldFilter, FilterOp, Page, PageLimits, PaginationMeta, QueryParams, QuerySpec, Sort,
            SortDirection,
        },
        repository::{Deletion, EntityRepository, Repository},
        store::{Document, DocumentCollection, DocumentStore},
    };

    // === Macros ===
    pub use crate::impl_entity;

    // === Entities ===
    pub use crate::entities::{
        Order, OrderRepository, OrderRepositoryExt, Product, ProductRepository, ShopItem,
    };

    // === Observability ===
    pub use crate::observe::{Instrumenter, RecordingTracer, Tracer, TracingTracer, init_logging};

    // === Storage ===
    #[cfg(feature = "in-memory")]
    pub use crate::storage::InMemoryStore;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoStore;

    // === Config ===
    pub use crate::config::{MongoConfig, PaginationConfig, RepositoryConfig};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
}
