//! Query specifications, validation and paged results

use crate::core::error::QueryError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Page size used when a caller does not ask for one
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Upper bound on page size unless configured otherwise
pub const DEFAULT_MAX_PAGE_SIZE: u64 = 100;

/// Direction of a sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Requested ordering of a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// A filter operator together with its operand
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// Field equals the value exactly
    Equals(Value),
    /// Field contains the text, case-insensitively
    Contains(String),
    /// Field lies within the inclusive bounds; at least one bound must be set
    Range {
        min: Option<Value>,
        max: Option<Value>,
    },
    /// Field equals one of the values
    In(Vec<Value>),
}

impl FilterOp {
    pub fn name(&self) -> &'static str {
        match self {
            FilterOp::Equals(_) => "equals",
            FilterOp::Contains(_) => "contains",
            FilterOp::Range { .. } => "range",
            FilterOp::In(_) => "in",
        }
    }
}

/// One `(field, operator, value)` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: FilterOp,
}

impl FieldFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Equals(value.into()),
        }
    }

    pub fn contains(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Contains(text.into()),
        }
    }

    pub fn range(field: impl Into<String>, min: Option<Value>, max: Option<Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Range { min, max },
        }
    }

    pub fn one_of<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::In(values.into_iter().map(Into::into).collect()),
        }
    }
}

/// Caller intent for a paged listing
///
/// # Example
/// ```rust,ignore
/// let spec = QuerySpec::new(2, 10)
///     .sorted_by(Sort::desc("price"))
///     .with_filter(FieldFilter::range("price", Some(json!(10)), None))
///     .with_search("widget");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Page number (starts at 1)
    pub page: u64,
    /// Number of items per page
    pub page_size: u64,
    pub sort: Option<Sort>,
    /// Predicates combined with logical AND; empty means no filtering
    pub filters: Vec<FieldFilter>,
    /// Free-text term, ANDed with `filters`
    pub search: Option<String>,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl QuerySpec {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page,
            page_size,
            sort: None,
            filters: Vec::new(),
            search: None,
        }
    }

    pub fn sorted_by(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Check the page bounds and normalize the spec before it is compiled.
    ///
    /// A page size above the configured maximum is clamped to it; zero page
    /// numbers or sizes are rejected. Blank search text counts as no search.
    pub fn validate(&self, limits: &PageLimits) -> Result<ValidatedQuery, QueryError> {
        if self.page == 0 {
            return Err(QueryError::ZeroPage);
        }
        if self.page_size == 0 {
            return Err(QueryError::ZeroPageSize);
        }

        let page_size = self.page_size.min(limits.max_page_size.max(1));
        let skip = (self.page - 1)
            .checked_mul(page_size)
            .ok_or(QueryError::PageOutOfRange {
                page: self.page,
                page_size,
            })?;

        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(ValidatedQuery {
            spec: QuerySpec {
                page: self.page,
                page_size,
                sort: self.sort.clone(),
                filters: self.filters.clone(),
                search,
            },
            skip,
        })
    }
}

/// Page size bounds applied during validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// First page at the default page size
    pub fn first_page(&self) -> QuerySpec {
        QuerySpec::new(1, self.default_page_size)
    }
}

/// A query specification that passed validation
///
/// Only [`QuerySpec::validate`] produces this type, so the filter compiler and
/// paginator never see an out-of-range page.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedQuery {
    spec: QuerySpec,
    skip: u64,
}

impl ValidatedQuery {
    pub fn page(&self) -> u64 {
        self.spec.page
    }

    /// Effective page size, after clamping
    pub fn page_size(&self) -> u64 {
        self.spec.page_size
    }

    /// `(page - 1) * page_size`
    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.spec.sort.as_ref()
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.spec.filters
    }

    pub fn search(&self) -> Option<&str> {
        self.spec.search.as_deref()
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Items on this page, in the requested order
    pub items: Vec<T>,
    /// Total number of matching documents across all pages
    pub total_count: u64,
    /// Page number (starts at 1)
    pub page: u64,
    /// Effective page size
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64, page: u64, page_size: u64) -> Self {
        Self {
            items,
            total_count,
            page,
            page_size,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_pages(&self) -> u64 {
        if self.total_count == 0 {
            0
        } else {
            self.total_count.div_ceil(self.page_size.max(1))
        }
    }

    pub fn has_next(&self) -> bool {
        self.page.saturating_mul(self.page_size) < self.total_count
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn meta(&self) -> PaginationMeta {
        PaginationMeta {
            page: self.page,
            page_size: self.page_size,
            total: self.total_count,
            total_pages: self.total_pages(),
            has_next: self.has_next(),
            has_prev: self.has_prev(),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub page: u64,
    pub page_size: u64,
    /// Total number of items (after filters)
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Query parameters for pagination and filtering, in query-string shape
///
/// # Example
/// ```text
/// ?page=2&limit=10
/// ?filter={"status": "active"}
/// ?page=1&limit=20&filter={"price>=": 100, "name~": "wid"}&sort=created_at:desc
/// ?search=widget
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    /// Page number (starts at 1)
    pub page: u64,

    /// Number of items per page; [`PageLimits::default_page_size`] when absent
    pub limit: Option<u64>,

    /// Filters as a JSON object
    ///
    /// # Format
    /// - Exact match: `{"field": "value"}`
    /// - Set membership: `{"field": ["a", "b"]}`
    /// - Inclusive bounds: `{"field>=": 10, "field<=": 20}`
    /// - Substring: `{"field~": "text"}`
    pub filter: Option<String>,

    /// Sort field and direction: `field`, `field:asc` or `field:desc`
    pub sort: Option<String>,

    /// Free-text search term
    pub search: Option<String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: None,
            filter: None,
            sort: None,
            search: None,
        }
    }
}

impl QueryParams {
    /// Convert into a [`QuerySpec`]; page bounds are checked later by `validate`
    ///
    /// A missing `limit` takes `limits.default_page_size`.
    pub fn to_spec(&self, limits: &PageLimits) -> Result<QuerySpec, QueryError> {
        let mut spec = limits.first_page();
        spec.page = self.page;
        if let Some(limit) = self.limit {
            spec.page_size = limit;
        }

        if let Some(raw) = self.filter.as_deref().filter(|s| !s.trim().is_empty()) {
            let object: Map<String, Value> =
                serde_json::from_str(raw).map_err(|e| QueryError::MalformedParam {
                    param: "filter",
                    reason: e.to_string(),
                })?;
            spec.filters = parse_filter_object(object)?;
        }

        if let Some(raw) = self.sort.as_deref().filter(|s| !s.trim().is_empty()) {
            spec.sort = Some(parse_sort(raw)?);
        }

        spec.search = self.search.clone();
        Ok(spec)
    }
}

fn parse_filter_object(object: Map<String, Value>) -> Result<Vec<FieldFilter>, QueryError> {
    let mut filters: Vec<FieldFilter> = Vec::new();
    let mut ranges: Vec<(String, Option<Value>, Option<Value>)> = Vec::new();

    for (key, value) in object {
        if let Some(field) = key.strip_suffix(">=") {
            range_entry(&mut ranges, field).1 = Some(value);
        } else if let Some(field) = key.strip_suffix("<=") {
            range_entry(&mut ranges, field).2 = Some(value);
        } else if let Some(field) = key.strip_suffix('~') {
            let text = value.as_str().ok_or_else(|| QueryError::InvalidValue {
                field: field.to_string(),
                reason: "substring filter needs a string".to_string(),
            })?;
            filters.push(FieldFilter::contains(field, text));
        } else if key.ends_with('>') || key.ends_with('<') {
            return Err(QueryError::MalformedParam {
                param: "filter",
                reason: format!("strict comparison in '{}' is not supported, use >= or <=", key),
            });
        } else {
            match value {
                Value::Array(values) => filters.push(FieldFilter::one_of(key, values)),
                other => filters.push(FieldFilter::equals(key, other)),
            }
        }
    }

    filters.extend(
        ranges
            .into_iter()
            .map(|(field, min, max)| FieldFilter::range(field, min, max)),
    );
    Ok(filters)
}

fn range_entry<'a>(
    ranges: &'a mut Vec<(String, Option<Value>, Option<Value>)>,
    field: &str,
) -> &'a mut (String, Option<Value>, Option<Value>) {
    let pos = match ranges.iter().position(|(f, _, _)| f == field) {
        Some(pos) => pos,
        None => {
            ranges.push((field.to_string(), None, None));
            ranges.len() - 1
        }
    };
    &mut ranges[pos]
}

fn parse_sort(raw: &str) -> Result<Sort, QueryError> {
    let (field, direction) = match raw.split_once(':') {
        Some((field, dir)) => (field.trim(), dir.trim()),
        None => (raw.trim(), "asc"),
    };

    if field.is_empty() {
        return Err(QueryError::MalformedParam {
            param: "sort",
            reason: "missing sort field".to_string(),
        });
    }

    let direction = match direction.to_ascii_lowercase().as_str() {
        "asc" => SortDirection::Ascending,
        "desc" => SortDirection::Descending,
        other => {
            return Err(QueryError::MalformedParam {
                param: "sort",
                reason: format!("unknown sort direction '{}'", other),
            });
        }
    };

    Ok(Sort {
        field: field.to_string(),
        direction,
    })
}
