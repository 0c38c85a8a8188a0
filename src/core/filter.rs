//! Filter compiler: query specifications to store-native predicates
//!
//! The compiler is pure. The same [`ValidatedQuery`] always compiles to an
//! equal [`CompiledFilter`], which is what makes the paginator testable
//! without a store.
//!
//! # Composition
//!
//! - every structured filter becomes one clause
//! - free-text search becomes one clause: an OR of case-insensitive substring
//!   matches over the entity's searchable fields
//! - clauses are ANDed; no clauses means match-all
//!
//! Search text and `Contains` operands are literals. Backends must escape them
//! before handing them to a pattern engine.

use crate::core::entity::Entity;
use crate::core::error::QueryError;
use crate::core::field::{FieldKind, ID_FIELD};
use crate::core::query::{FieldFilter, FilterOp, Sort, SortDirection, ValidatedQuery};
use serde_json::Value;

/// Predicate tree understood by every store backend
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Matches every document
    All,
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Eq {
        field: String,
        value: Value,
    },
    /// Case-insensitive substring match on a literal
    Pattern {
        field: String,
        literal: String,
    },
    /// Inclusive bounds
    Range {
        field: String,
        min: Option<Value>,
        max: Option<Value>,
    },
    In {
        field: String,
        values: Vec<Value>,
    },
}

/// An opaque, validated predicate
///
/// Only this crate builds compiled filters, so no arbitrary store query can be
/// smuggled in through a repository. Backends read the tree via [`expr`](Self::expr).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    expr: FilterExpr,
}

impl CompiledFilter {
    pub(crate) fn new(expr: FilterExpr) -> Self {
        Self { expr }
    }

    pub(crate) fn match_all() -> Self {
        Self::new(FilterExpr::All)
    }

    pub fn expr(&self) -> &FilterExpr {
        &self.expr
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self.expr, FilterExpr::All)
    }
}

/// One key of a compiled sort
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// A validated ordering, always ending with `id` so pages are stable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    keys: Vec<SortKey>,
}

impl SortOrder {
    pub(crate) fn by_id() -> Self {
        Self {
            keys: vec![SortKey {
                field: ID_FIELD.to_string(),
                direction: SortDirection::Ascending,
            }],
        }
    }

    /// `keys`, followed by `id` ascending unless `id` is already a key
    pub(crate) fn with_id_tiebreaker(mut keys: Vec<SortKey>) -> Self {
        if !keys.iter().any(|key| key.field == ID_FIELD) {
            keys.push(SortKey {
                field: ID_FIELD.to_string(),
                direction: SortDirection::Ascending,
            });
        }
        Self { keys }
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }
}

/// Compile a validated query into a filter for entity `T`
pub fn compile<T: Entity>(query: &ValidatedQuery) -> Result<CompiledFilter, QueryError> {
    let mut clauses = query
        .filters()
        .iter()
        .map(compile_field_filter::<T>)
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(text) = query.search() {
        clauses.push(search_clause::<T>(text)?);
    }

    let expr = match clauses.len() {
        0 => FilterExpr::All,
        1 => clauses.remove(0),
        _ => FilterExpr::And(clauses),
    };
    Ok(CompiledFilter::new(expr))
}

/// Compile the requested ordering for entity `T`
pub fn compile_sort<T: Entity>(sort: Option<&Sort>) -> Result<SortOrder, QueryError> {
    let Some(sort) = sort else {
        return Ok(SortOrder::by_id());
    };

    if T::field_kind(&sort.field).is_none() {
        return Err(QueryError::UnknownField {
            field: sort.field.clone(),
        });
    }

    Ok(SortOrder::with_id_tiebreaker(vec![SortKey {
        field: sort.field.clone(),
        direction: sort.direction,
    }]))
}

/// Predicate addressing a single document by identifier
pub fn by_id(id: &str) -> CompiledFilter {
    CompiledFilter::new(FilterExpr::Eq {
        field: ID_FIELD.to_string(),
        value: Value::String(id.to_string()),
    })
}

/// Predicate matching documents whose declared `field` equals `value`
pub fn by_field<T: Entity>(field: &str, value: &Value) -> Result<CompiledFilter, QueryError> {
    compile_field_filter::<T>(&FieldFilter::equals(field, value.clone())).map(CompiledFilter::new)
}

fn compile_field_filter<T: Entity>(filter: &FieldFilter) -> Result<FilterExpr, QueryError> {
    let field = filter.field.as_str();
    let kind = T::field_kind(field).ok_or_else(|| QueryError::UnknownField {
        field: field.to_string(),
    })?;

    match &filter.op {
        FilterOp::Equals(value) => {
            check_scalar(field, kind, value)?;
            Ok(FilterExpr::Eq {
                field: field.to_string(),
                value: kind.normalize(value),
            })
        }
        FilterOp::In(values) => {
            for value in values {
                check_scalar(field, kind, value)?;
            }
            Ok(FilterExpr::In {
                field: field.to_string(),
                values: values.iter().map(|value| kind.normalize(value)).collect(),
            })
        }
        FilterOp::Contains(text) => {
            if !kind.supports_contains() {
                return Err(unsupported(filter));
            }
            if text.is_empty() {
                return Err(QueryError::InvalidValue {
                    field: field.to_string(),
                    reason: "substring must not be empty".to_string(),
                });
            }
            Ok(FilterExpr::Pattern {
                field: field.to_string(),
                literal: text.clone(),
            })
        }
        FilterOp::Range { min, max } => {
            if !kind.supports_range() {
                return Err(unsupported(filter));
            }
            if min.is_none() && max.is_none() {
                return Err(QueryError::InvalidValue {
                    field: field.to_string(),
                    reason: "range needs at least one bound".to_string(),
                });
            }
            for bound in [min, max].into_iter().flatten() {
                if !kind.accepts(bound) {
                    return Err(QueryError::InvalidValue {
                        field: field.to_string(),
                        reason: format!("range bound must be a {} value", kind.as_str()),
                    });
                }
                check_integer_range(field, bound)?;
            }
            Ok(FilterExpr::Range {
                field: field.to_string(),
                min: min.as_ref().map(|bound| kind.normalize(bound)),
                max: max.as_ref().map(|bound| kind.normalize(bound)),
            })
        }
    }
}

fn search_clause<T: Entity>(text: &str) -> Result<FilterExpr, QueryError> {
    let fields = T::searchable_fields();
    if fields.is_empty() {
        return Err(QueryError::SearchUnsupported);
    }

    Ok(FilterExpr::Or(
        fields
            .iter()
            .map(|field| FilterExpr::Pattern {
                field: (*field).to_string(),
                literal: text.to_string(),
            })
            .collect(),
    ))
}

fn check_scalar(field: &str, kind: FieldKind, value: &Value) -> Result<(), QueryError> {
    if value.is_null() || kind.accepts(value) {
        check_integer_range(field, value)
    } else {
        Err(QueryError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a {} value", kind.as_str()),
        })
    }
}

/// Integers must fit in an `i64`, the widest integer document stores hold
fn check_integer_range(field: &str, value: &Value) -> Result<(), QueryError> {
    match value.as_number() {
        Some(n) if n.is_u64() && n.as_i64().is_none() => Err(QueryError::InvalidValue {
            field: field.to_string(),
            reason: format!("integer {} does not fit in 64-bit signed range", n),
        }),
        _ => Ok(()),
    }
}

fn unsupported(filter: &FieldFilter) -> QueryError {
    QueryError::UnsupportedOperator {
        field: filter.field.clone(),
        operator: filter.op.name(),
    }
}
