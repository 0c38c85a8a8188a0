//! Generic entity repository over a document collection

use crate::config::RepositoryConfig;
use crate::core::codec;
use crate::core::context::Context;
use crate::core::entity::Entity;
use crate::core::error::{Cause, Operation, RepositoryError};
use crate::core::filter;
use crate::core::paginate::paginate;
use crate::core::query::{Page, PageLimits, QuerySpec};
use crate::core::store::{DocumentCollection, DocumentStore};
use crate::observe::{Call, Instrumenter, ResultSummary, Tracer};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a delete: absence is an answer, not a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    NotFound,
}

impl Deletion {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Deletion::Deleted)
    }
}

/// Operations every entity repository offers
///
/// Every method takes the caller's [`Context`] first and forwards it to each
/// store call it makes. Lookups report absence as `Ok(None)`; `Err` always
/// means the operation itself failed.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// One page of every entity, narrowed by the query's own filters and search
    async fn list_all(&self, ctx: &Context, spec: &QuerySpec) -> Result<Page<T>, RepositoryError>;

    /// One page of entities whose searchable fields contain `text`
    ///
    /// `text` replaces any search term already set on `spec`.
    async fn search(
        &self,
        ctx: &Context,
        text: &str,
        spec: &QuerySpec,
    ) -> Result<Page<T>, RepositoryError>;

    async fn get_by_id(&self, ctx: &Context, id: &str) -> Result<Option<T>, RepositoryError>;

    /// First entity whose declared `field` equals `value`
    async fn get_by_field(
        &self,
        ctx: &Context,
        field: &str,
        value: &Value,
    ) -> Result<Option<T>, RepositoryError>;

    /// Insert a new entity; fails with a `Conflict` if its id is taken
    async fn create(&self, ctx: &Context, entity: T) -> Result<T, RepositoryError>;

    /// Replace the entity with the same id, inserting it if absent
    ///
    /// Returns the stored state immediately after the write.
    async fn update(&self, ctx: &Context, entity: T) -> Result<T, RepositoryError>;

    async fn delete_by_id(&self, ctx: &Context, id: &str) -> Result<Deletion, RepositoryError>;

    /// Like [`get_by_id`](Self::get_by_id), but absence is a `NotFound` error
    async fn require_by_id(&self, ctx: &Context, id: &str) -> Result<T, RepositoryError> {
        match self.get_by_id(ctx, id).await? {
            Some(entity) => Ok(entity),
            None => Err(RepositoryError::not_found(
                T::repository_name(),
                Operation::GetById,
                id,
            )),
        }
    }
}

/// [`Repository`] implementation for entity `T` stored in collection `C`
///
/// Holds no mutable state; clones share the underlying collection handle.
///
/// # Example
/// ```rust,ignore
/// let store = InMemoryStore::new();
/// let repo: EntityRepository<Product, _> = EntityRepository::from_store(&store, &config);
///
/// let ctx = Context::with_timeout(Duration::from_secs(2));
/// let page = repo.search(&ctx, "widget", &QuerySpec::new(1, 10)).await?;
/// ```
pub struct EntityRepository<T, C> {
    collection: C,
    limits: PageLimits,
    timeout: Option<Duration>,
    instrumenter: Instrumenter,
    _entity: PhantomData<fn() -> T>,
}

impl<T, C: Clone> Clone for EntityRepository<T, C> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            limits: self.limits,
            timeout: self.timeout,
            instrumenter: self.instrumenter.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T, C> EntityRepository<T, C>
where
    T: Entity,
    C: DocumentCollection,
{
    /// Repository with default page limits, no default timeout and `tracing` spans
    pub fn new(collection: C) -> Self {
        Self {
            collection,
            limits: PageLimits::default(),
            timeout: None,
            instrumenter: Instrumenter::default(),
            _entity: PhantomData,
        }
    }

    /// Repository over `T::collection_name()` in `store`, configured from `config`
    pub fn from_store<S>(store: &S, config: &RepositoryConfig) -> Self
    where
        S: DocumentStore<Collection = C>,
    {
        Self::new(store.collection(T::collection_name()))
            .with_limits(config.page_limits())
            .with_timeout(config.operation_timeout())
    }

    pub fn with_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Deadline applied to operations whose context carries none
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.instrumenter = Instrumenter::new(tracer);
        self
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn limits(&self) -> PageLimits {
        self.limits
    }

    fn context(&self, ctx: &Context) -> Context {
        ctx.clone().with_default_timeout(self.timeout)
    }

    async fn page(&self, ctx: &Context, spec: &QuerySpec) -> Result<Page<T>, Cause> {
        let query = spec.validate(&self.limits)?;
        let filter = filter::compile::<T>(&query)?;
        let sort = filter::compile_sort::<T>(query.sort())?;
        paginate(ctx, &self.collection, &filter, &sort, &query).await
    }

    async fn find_one(
        &self,
        ctx: &Context,
        filter: Result<filter::CompiledFilter, Cause>,
    ) -> Result<Option<T>, Cause> {
        let filter = filter?;
        match self.collection.find_one(ctx, &filter).await? {
            Some(document) => Ok(Some(codec::decode(document)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<T, C> Repository<T> for EntityRepository<T, C>
where
    T: Entity,
    C: DocumentCollection + 'static,
{
    async fn list_all(&self, ctx: &Context, spec: &QuerySpec) -> Result<Page<T>, RepositoryError> {
        let ctx = self.context(ctx);
        let call = Call::new(T::repository_name(), Operation::ListAll).query(spec);
        self.instrumenter
            .instrument(call, ResultSummary::page, self.page(&ctx, spec))
            .await
    }

    async fn search(
        &self,
        ctx: &Context,
        text: &str,
        spec: &QuerySpec,
    ) -> Result<Page<T>, RepositoryError> {
        let ctx = self.context(ctx);
        let spec = spec.clone().with_search(text);
        let call = Call::new(T::repository_name(), Operation::Search).query(&spec);
        self.instrumenter
            .instrument(call, ResultSummary::page, self.page(&ctx, &spec))
            .await
    }

    async fn get_by_id(&self, ctx: &Context, id: &str) -> Result<Option<T>, RepositoryError> {
        let ctx = self.context(ctx);
        let call = Call::new(T::repository_name(), Operation::GetById).id(id);
        self.instrumenter
            .instrument(
                call,
                ResultSummary::lookup,
                self.find_one(&ctx, Ok(filter::by_id(id))),
            )
            .await
    }

    async fn get_by_field(
        &self,
        ctx: &Context,
        field: &str,
        value: &Value,
    ) -> Result<Option<T>, RepositoryError> {
        let ctx = self.context(ctx);
        let call = Call::new(T::repository_name(), Operation::GetByField)
            .field(field)
            .value(value);
        let filter = filter::by_field::<T>(field, value).map_err(Cause::from);
        self.instrumenter
            .instrument(call, ResultSummary::lookup, self.find_one(&ctx, filter))
            .await
    }

    async fn create(&self, ctx: &Context, entity: T) -> Result<T, RepositoryError> {
        let ctx = self.context(ctx);
        let call = Call::new(T::repository_name(), Operation::Create).id(entity.id());
        let insert = async {
            let document = codec::encode_entity(&entity)?;
            self.collection.insert_one(&ctx, document).await?;
            Ok::<_, Cause>(entity)
        };
        self.instrumenter
            .instrument(call, |_| ResultSummary::written(), insert)
            .await
    }

    async fn update(&self, ctx: &Context, entity: T) -> Result<T, RepositoryError> {
        let ctx = self.context(ctx);
        let call = Call::new(T::repository_name(), Operation::Update).id(entity.id());
        let upsert = async {
            let document = codec::encode_entity(&entity)?;
            let stored = self
                .collection
                .find_one_and_upsert(&ctx, &filter::by_id(entity.id()), document)
                .await?;
            codec::decode(stored)
        };
        self.instrumenter
            .instrument(call, |_| ResultSummary::written(), upsert)
            .await
    }

    async fn delete_by_id(&self, ctx: &Context, id: &str) -> Result<Deletion, RepositoryError> {
        let ctx = self.context(ctx);
        let call = Call::new(T::repository_name(), Operation::DeleteById).id(id);
        let delete = async {
            let removed = self
                .collection
                .find_one_and_delete(&ctx, &filter::by_id(id))
                .await?;
            Ok::<_, Cause>(match removed {
                Some(_) => Deletion::Deleted,
                None => Deletion::NotFound,
            })
        };
        self.instrumenter
            .instrument(
                call,
                |deletion: &Deletion| ResultSummary::deletion(deletion.is_deleted()),
                delete,
            )
            .await
    }
}
