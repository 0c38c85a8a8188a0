//! Pagination executor shared by every repository
//!
//! `skip = (page - 1) * page_size`, then a count and a page fetch with the
//! same compiled filter. The two queries are issued concurrently and are not
//! transactionally consistent: a write landing between them can make
//! `total_count` and `items` momentarily disagree. That is accepted.

use crate::core::codec;
use crate::core::context::Context;
use crate::core::entity::Entity;
use crate::core::error::Cause;
use crate::core::filter::{CompiledFilter, SortOrder};
use crate::core::query::{Page, ValidatedQuery};
use crate::core::store::DocumentCollection;

/// Run one page of `query` against `collection`
///
/// A single document that fails to decode fails the whole page; records are
/// never silently dropped. A page past the end is empty, not an error.
pub async fn paginate<T, C>(
    ctx: &Context,
    collection: &C,
    filter: &CompiledFilter,
    sort: &SortOrder,
    query: &ValidatedQuery,
) -> Result<Page<T>, Cause>
where
    T: Entity,
    C: DocumentCollection + ?Sized,
{
    let (total_count, documents) = futures::try_join!(
        collection.count(ctx, filter),
        collection.find(ctx, filter, sort, query.skip(), query.page_size()),
    )?;

    let items = documents
        .into_iter()
        .map(codec::decode::<T>)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page::new(
        items,
        total_count,
        query.page(),
        query.page_size(),
    ))
}
