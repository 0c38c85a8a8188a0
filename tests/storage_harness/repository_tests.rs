//! Macro-generated test suite for `Repository<TestRecord>` contract validation.
//!
//! The `repository_contract_tests!` macro generates a test module that runs an
//! `EntityRepository<TestRecord, _>` over any `DocumentCollection` and checks
//! the full contract: paging, search, filters, sorting, CRUD semantics, spans
//! and concurrent access.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use docrepo::core::store::DocumentStore;
//! use docrepo::storage::InMemoryStore;
//! use storage_harness::*;
//!
//! repository_contract_tests!(InMemoryStore::new().collection("test_records"));
//! ```
//!
//! # Generated Tests
//!
//! ## Paging
//! - `test_pages_over_25_records`: 10/10/5/0 items, total 25 on every page
//! - `test_item_count_matches_formula`: `min(size, max(0, total - (page-1)*size))`
//! - `test_page_size_is_clamped`: page size above the maximum is echoed clamped
//! - `test_invalid_page_is_rejected`: page 0 and size 0 are InvalidQuery
//!
//! ## Search, filters & sorting
//! - `test_search_is_case_insensitive_over_searchable_fields`
//! - `test_search_text_is_literal`
//! - `test_search_results_are_subset_of_list`
//! - `test_structured_filters_and_search_compose`
//! - `test_unknown_field_is_rejected`
//! - `test_sort_with_tiebreaker`
//! - `test_timestamps_order_chronologically`: sub-second instants sort and range by time
//!
//! ## CRUD
//! - `test_create_update_get`
//! - `test_update_upserts_fresh_id`
//! - `test_update_is_idempotent`
//! - `test_read_after_delete`
//! - `test_get_missing_is_none`
//! - `test_create_duplicate_is_conflict`
//! - `test_get_by_field`
//!
//! ## Observability & concurrency
//! - `test_every_operation_closes_its_span`
//! - `test_cancelled_context_stops_operation`
//! - `test_concurrent_creates`

/// Generate a full `Repository<TestRecord>` conformance test suite.
///
/// `$factory` must be an expression that evaluates to a fresh, empty
/// `DocumentCollection + 'static`. It is re-evaluated for each test to ensure
/// isolation.
#[macro_export]
macro_rules! repository_contract_tests {
    ($factory:expr) => {
        mod repository_contract_tests {
            use super::*;
            use docrepo::core::context::Context;
            use docrepo::core::error::ErrorKind;
            use docrepo::core::query::{FieldFilter, PageLimits, QuerySpec, Sort};
            use docrepo::core::repository::{Deletion, EntityRepository, Repository};
            use serde_json::json;
            use std::collections::HashSet;
            use std::sync::Arc;
            use tokio_test::assert_ok;

            // ==================================================================
            // Paging
            // ==================================================================

            #[tokio::test]
            async fn test_pages_over_25_records() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                seed(&repo, 25).await;
                let ctx = Context::new();

                let mut seen = Vec::new();
                for (page, expected) in [(1, 10), (2, 10), (3, 5), (4, 0)] {
                    let result = assert_ok!(repo.list_all(&ctx, &QuerySpec::new(page, 10)).await);
                    assert_eq!(result.items.len(), expected, "page {page}");
                    assert_eq!(result.total_count, 25);
                    assert_eq!(result.page, page);
                    assert_eq!(result.page_size, 10);
                    seen.extend(ids(&result));
                }

                let expected: Vec<_> = (0..25).map(|i| numbered(i).id).collect();
                assert_eq!(seen, expected, "pages must tile the id order exactly");
            }

            #[tokio::test]
            async fn test_item_count_matches_formula() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                let total = 7u64;
                seed(&repo, total as usize).await;
                let ctx = Context::new();

                for size in [1u64, 3, 7, 10] {
                    for page in 1..=8u64 {
                        let result =
                            assert_ok!(repo.list_all(&ctx, &QuerySpec::new(page, size)).await);
                        let expected = size.min(total.saturating_sub((page - 1) * size));
                        assert_eq!(result.items.len() as u64, expected, "page {page} size {size}");
                        assert_eq!(result.total_count, total);
                    }
                }
            }

            #[tokio::test]
            async fn test_page_size_is_clamped() {
                let repo = EntityRepository::<TestRecord, _>::new($factory).with_limits(
                    PageLimits {
                        default_page_size: 2,
                        max_page_size: 4,
                    },
                );
                seed(&repo, 6).await;

                let result = assert_ok!(
                    repo.list_all(&Context::new(), &QuerySpec::new(1, 50))
                        .await
                );
                assert_eq!(result.page_size, 4);
                assert_eq!(result.items.len(), 4);
                assert_eq!(result.total_count, 6);
            }

            #[tokio::test]
            async fn test_invalid_page_is_rejected() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                let ctx = Context::new();

                let err = repo.list_all(&ctx, &QuerySpec::new(0, 10)).await.unwrap_err();
                assert_eq!(err.kind(), ErrorKind::InvalidQuery);

                let err = repo
                    .search(&ctx, "x", &QuerySpec::new(1, 0))
                    .await
                    .unwrap_err();
                assert_eq!(err.kind(), ErrorKind::InvalidQuery);
                assert_eq!(err.search_text(), Some("x"));
            }

            // ==================================================================
            // Search, filters & sorting
            // ==================================================================

            async fn seed_search_set<R: Repository<TestRecord>>(repo: &R) {
                let ctx = Context::new();
                for record in [
                    create_test_record("s1", "Alpha Widget", "alpha@shop.com", 10, true),
                    create_test_record("s2", "beta", "WIDGET.fan@shop.com", 20, false),
                    create_test_record("s3", "Gamma gadget", "gamma@shop.com", 30, true),
                    create_test_record("s4", "w.dget", "delta@shop.com", 40, true),
                ] {
                    assert_ok!(repo.create(&ctx, record).await);
                }
            }

            #[tokio::test]
            async fn test_search_is_case_insensitive_over_searchable_fields() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                seed_search_set(&repo).await;

                let page = assert_ok!(
                    repo.search(&Context::new(), "widget", &QuerySpec::new(1, 10))
                        .await
                );
                assert_eq!(ids(&page), ["s1", "s2"]);
                assert_eq!(page.total_count, 2);
            }

            #[tokio::test]
            async fn test_search_text_is_literal() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                seed_search_set(&repo).await;
                let ctx = Context::new();

                let page = assert_ok!(repo.search(&ctx, "w.dget", &QuerySpec::new(1, 10)).await);
                assert_eq!(ids(&page), ["s4"], "'.' must not act as a wildcard");

                let page = assert_ok!(repo.search(&ctx, "(", &QuerySpec::new(1, 10)).await);
                assert!(page.is_empty());
            }

            #[tokio::test]
            async fn test_search_results_are_subset_of_list() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                seed_search_set(&repo).await;
                seed(&repo, 6).await;
                let ctx = Context::new();

                let all: HashSet<_> = assert_ok!(
                    repo.list_all(&ctx, &QuerySpec::new(1, 100)).await
                )
                .items
                .into_iter()
                .map(|r| r.id)
                .collect();

                for text in ["a", "WIDGET", "record 1", "@test.com", "nothing-matches"] {
                    let found = assert_ok!(repo.search(&ctx, text, &QuerySpec::new(1, 100)).await);
                    for record in &found.items {
                        assert!(all.contains(&record.id));
                        let needle = text.to_lowercase();
                        assert!(
                            record.name.to_lowercase().contains(&needle)
                                || record.email.to_lowercase().contains(&needle),
                            "{} does not contain {text}",
                            record.id
                        );
                    }
                }
            }

            #[tokio::test]
            async fn test_structured_filters_and_search_compose() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                seed_search_set(&repo).await;
                let ctx = Context::new();

                let spec = QuerySpec::new(1, 10)
                    .with_filter(FieldFilter::equals("active", true))
                    .with_filter(FieldFilter::range("age", Some(json!(20)), Some(json!(40))));
                let page = assert_ok!(repo.list_all(&ctx, &spec).await);
                assert_eq!(ids(&page), ["s3", "s4"]);

                let page = assert_ok!(repo.search(&ctx, "gadget", &spec).await);
                assert_eq!(ids(&page), ["s3"]);

                let spec = QuerySpec::new(1, 10)
                    .with_filter(FieldFilter::one_of("name", ["beta", "w.dget"]))
                    .with_filter(FieldFilter::contains("email", "SHOP"));
                let page = assert_ok!(repo.list_all(&ctx, &spec).await);
                assert_eq!(ids(&page), ["s2", "s4"]);
                assert_eq!(page.total_count, 2);
            }

            #[tokio::test]
            async fn test_unknown_field_is_rejected() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                let ctx = Context::new();

                let spec = QuerySpec::new(1, 10).with_filter(FieldFilter::equals("password", "x"));
                let err = repo.list_all(&ctx, &spec).await.unwrap_err();
                assert_eq!(err.kind(), ErrorKind::InvalidQuery);

                let spec = QuerySpec::new(1, 10).sorted_by(Sort::asc("password"));
                let err = repo.list_all(&ctx, &spec).await.unwrap_err();
                assert_eq!(err.kind(), ErrorKind::InvalidQuery);
            }

            #[tokio::test]
            async fn test_sort_with_tiebreaker() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                seed(&repo, 10).await;
                let ctx = Context::new();

                let spec = QuerySpec::new(1, 10).sorted_by(Sort::desc("age"));
                let page = assert_ok!(repo.list_all(&ctx, &spec).await);
                let order: Vec<_> = page.items.iter().map(|r| (r.age, r.id.clone())).collect();

                let mut expected = order.clone();
                expected.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
                assert_eq!(order, expected);
                assert_eq!(order[0], (40, "rec-004".to_string()));
                assert_eq!(order[1], (40, "rec-009".to_string()));
            }

            #[tokio::test]
            async fn test_timestamps_order_chronologically() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                let ctx = Context::new();
                for (id, at) in [
                    ("a-later", "2024-01-01T00:00:00.500Z"),
                    ("b-early", "2024-01-01T00:00:00Z"),
                    ("c-latest", "2024-01-01T00:00:01.25Z"),
                ] {
                    let mut record = create_test_record(id, id, "t@test.com", 1, true);
                    record.created_at = at.parse().unwrap();
                    assert_ok!(repo.create(&ctx, record).await);
                }

                let spec = QuerySpec::new(1, 10).sorted_by(Sort::asc("created_at"));
                let page = assert_ok!(repo.list_all(&ctx, &spec).await);
                assert_eq!(ids(&page), ["b-early", "a-later", "c-latest"]);

                let spec = QuerySpec::new(1, 10).with_filter(FieldFilter::range(
                    "created_at",
                    Some(json!("2024-01-01T00:00:00Z")),
                    None,
                ));
                let page = assert_ok!(repo.list_all(&ctx, &spec).await);
                assert_eq!(page.total_count, 3);

                let spec = QuerySpec::new(1, 10).with_filter(FieldFilter::range(
                    "created_at",
                    Some(json!("2024-01-01T01:00:00.5+01:00")),
                    Some(json!("2024-01-01T00:00:01Z")),
                ));
                let page = assert_ok!(repo.list_all(&ctx, &spec).await);
                assert_eq!(ids(&page), ["a-later"]);

                let found = assert_ok!(
                    repo.get_by_field(&ctx, "created_at", &json!("2024-01-01T00:00:01.250+00:00"))
                        .await
                );
                assert_eq!(found.map(|r| r.id), Some("c-latest".to_string()));
            }

            // ==================================================================
            // CRUD
            // ==================================================================

            #[tokio::test]
            async fn test_create_update_get() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                let ctx = Context::new();

                let created = assert_ok!(
                    repo.create(&ctx, create_test_record("A", "Alice", "alice@test.com", 30, true))
                        .await
                );
                assert_eq!(created.name, "Alice");

                let mut changed = created.clone();
                changed.name = "Alicia".to_string();
                changed.active = false;
                let updated = assert_ok!(repo.update(&ctx, changed.clone()).await);
                assert_eq!(updated, changed);

                let fetched = assert_ok!(repo.get_by_id(&ctx, "A").await);
                assert_eq!(fetched, Some(changed));
            }

            #[tokio::test]
            async fn test_update_upserts_fresh_id() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                let ctx = Context::new();

                let fresh = create_test_record("fresh", "New", "new@test.com", 1, true);
                let stored = assert_ok!(repo.update(&ctx, fresh.clone()).await);
                assert_eq!(stored, fresh);

                assert_eq!(assert_ok!(repo.get_by_id(&ctx, "fresh").await), Some(fresh));
            }

            #[tokio::test]
            async fn test_update_is_idempotent() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                seed(&repo, 3).await;
                let ctx = Context::new();

                let mut record = numbered(1);
                record.score = 9.5;
                let first = assert_ok!(repo.update(&ctx, record.clone()).await);
                let second = assert_ok!(repo.update(&ctx, record.clone()).await);
                assert_eq!(first, second);

                let page = assert_ok!(repo.list_all(&ctx, &QuerySpec::new(1, 10)).await);
                assert_eq!(page.total_count, 3);
            }

            #[tokio::test]
            async fn test_read_after_delete() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                seed(&repo, 2).await;
                let ctx = Context::new();
                let id = numbered(0).id;

                assert_eq!(assert_ok!(repo.delete_by_id(&ctx, &id).await), Deletion::Deleted);
                assert_eq!(assert_ok!(repo.get_by_id(&ctx, &id).await), None);
                assert_eq!(assert_ok!(repo.delete_by_id(&ctx, &id).await), Deletion::NotFound);

                let page = assert_ok!(repo.list_all(&ctx, &QuerySpec::new(1, 10)).await);
                assert_eq!(page.total_count, 1);
            }

            #[tokio::test]
            async fn test_get_missing_is_none() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);

                let found = assert_ok!(repo.get_by_id(&Context::new(), "no-such-id").await);
                assert!(found.is_none(), "absence is not an error");

                let err = repo.require_by_id(&Context::new(), "no-such-id").await.unwrap_err();
                assert_eq!(err.kind(), ErrorKind::NotFound);
            }

            #[tokio::test]
            async fn test_create_duplicate_is_conflict() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                seed(&repo, 1).await;

                let err = repo
                    .create(&Context::new(), numbered(0))
                    .await
                    .unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Conflict);
                assert_eq!(err.id(), Some(numbered(0).id.as_str()));
            }

            #[tokio::test]
            async fn test_get_by_field() {
                let repo = EntityRepository::<TestRecord, _>::new($factory);
                seed(&repo, 4).await;
                let ctx = Context::new();

                let found = assert_ok!(
                    repo.get_by_field(&ctx, "email", &json!("user2@test.com"))
                        .await
                );
                assert_eq!(found.map(|r| r.id), Some(numbered(2).id));

                let missing = assert_ok!(
                    repo.get_by_field(&ctx, "email", &json!("nobody@test.com"))
                        .await
                );
                assert!(missing.is_none());
            }

            // ==================================================================
            // Observability & concurrency
            // ==================================================================

            #[tokio::test]
            async fn test_every_operation_closes_its_span() {
                let (repo, tracer) = traced_repository($factory);
                let ctx = Context::new();

                assert_ok!(repo.create(&ctx, numbered(0)).await);
                assert_ok!(repo.update(&ctx, numbered(0)).await);
                assert_ok!(repo.get_by_id(&ctx, &numbered(0).id).await);
                assert_ok!(repo.list_all(&ctx, &QuerySpec::new(1, 5)).await);
                assert_ok!(repo.search(&ctx, "record", &QuerySpec::new(1, 5)).await);
                assert_ok!(repo.delete_by_id(&ctx, &numbered(0).id).await);

                for op in ["create", "update", "get_by_id", "list_all", "search", "delete_by_id"] {
                    let name = format!("test_record_repository.{op}");
                    let span = tracer
                        .last(&name)
                        .unwrap_or_else(|| panic!("missing span {name}"));
                    assert!(span.ended, "{name} left open");
                    assert!(span.error.is_none(), "{name} recorded an error");
                }
            }

            #[tokio::test]
            async fn test_cancelled_context_stops_operation() {
                let (repo, tracer) = traced_repository($factory);
                let ctx = Context::new();
                ctx.cancel();

                let err = repo
                    .list_all(&ctx, &QuerySpec::new(1, 10))
                    .await
                    .unwrap_err();
                assert_eq!(err.kind(), ErrorKind::Cancelled);

                let span = tracer.last("test_record_repository.list_all").unwrap();
                assert!(span.ended);
                assert_eq!(span.error_kind(), Some(ErrorKind::Cancelled));
            }

            #[tokio::test]
            async fn test_concurrent_creates() {
                let repo = Arc::new(EntityRepository::<TestRecord, _>::new($factory));

                let handles: Vec<_> = (0..10)
                    .map(|i| {
                        let repo = Arc::clone(&repo);
                        tokio::spawn(async move { repo.create(&Context::new(), numbered(i)).await })
                    })
                    .collect();
                for handle in handles {
                    assert_ok!(handle.await.unwrap());
                }

                let page = assert_ok!(
                    repo.list_all(&Context::new(), &QuerySpec::new(1, 20))
                        .await
                );
                assert_eq!(page.total_count, 10);
            }
        }
    };
}
