//! Core module containing the query engine and the repository abstraction

pub mod codec;
pub mod context;
pub mod entity;
pub mod error;
pub mod field;
pub mod filter;
pub mod paginate;
pub mod query;
pub mod repository;
pub mod store;

pub use context::Context;
pub use entity::Entity;
pub use error::{Cause, ErrorKind, Operation, QueryError, RepositoryError, StoreError};
pub use field::{FieldDef, FieldKind};
pub use filter::{CompiledFilter, FilterExpr, SortKey, SortOrder};
pub use query::{
    FieldFilter, FilterOp, Page, PageLimits, PaginationMeta, QueryParams, QuerySpec, Sort,
    SortDirection, ValidatedQuery,
};
pub use repository::{Deletion, EntityRepository, Repository};
pub use store::{Document, DocumentCollection, DocumentStore};
