//! In-memory document store for testing and development

use crate::core::context::Context;
use crate::core::error::StoreError;
use crate::core::field::ID_FIELD;
use crate::core::filter::{CompiledFilter, FilterExpr, SortOrder};
use crate::core::query::SortDirection;
use crate::core::store::{Document, DocumentCollection, DocumentStore};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// In-memory document store
///
/// Useful for testing and development. Uses RwLock for thread-safe access;
/// clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryStore {
    type Collection = InMemoryCollection;

    fn collection(&self, name: &str) -> InMemoryCollection {
        InMemoryCollection {
            name: name.to_string(),
            collections: Arc::clone(&self.collections),
        }
    }
}

/// One named collection of an [`InMemoryStore`], documents ordered by id
#[derive(Clone)]
pub struct InMemoryCollection {
    name: String,
    collections: Arc<RwLock<Collections>>,
}

impl InMemoryCollection {
    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, StoreError> {
        self.collections
            .read()
            .map_err(|e| StoreError::unavailable(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, StoreError> {
        self.collections
            .write()
            .map_err(|e| StoreError::unavailable(format!("Failed to acquire write lock: {}", e)))
    }

    /// Id of the first document matching `matcher`, in id order
    fn first_match(documents: &BTreeMap<String, Document>, matcher: &Matcher) -> Option<String> {
        documents
            .iter()
            .find(|(_, doc)| matcher.matches(doc))
            .map(|(id, _)| id.clone())
    }
}

#[async_trait]
impl DocumentCollection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn count(&self, ctx: &Context, filter: &CompiledFilter) -> Result<u64, StoreError> {
        ctx.run(async {
            let matcher = Matcher::build(filter.expr())?;
            let collections = self.read()?;
            Ok(collections
                .get(&self.name)
                .map(|docs| docs.values().filter(|doc| matcher.matches(doc)).count() as u64)
                .unwrap_or(0))
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
    ) -> Result<Vec<Document>, StoreError> {
        ctx.run(async {
            let matcher = Matcher::build(filter.expr())?;
            let collections = self.read()?;
            let Some(docs) = collections.get(&self.name) else {
                return Ok(Vec::new());
            };

            let mut found: Vec<&Document> =
                docs.values().filter(|doc| matcher.matches(doc)).collect();
            found.sort_by(|a, b| compare_documents(a, b, sort));

            Ok(found
                .into_iter()
                .skip(usize::try_from(skip).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .cloned()
                .collect())
        })
        .await
    }

    async fn find_one(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
    ) -> Result<Option<Document>, StoreError> {
        ctx.run(async {
            let matcher = Matcher::build(filter.expr())?;
            let collections = self.read()?;
            Ok(collections
                .get(&self.name)
                .and_then(|docs| docs.values().find(|doc| matcher.matches(doc)))
                .cloned())
        })
        .await
    }

    async fn insert_one(&self, ctx: &Context, document: Document) -> Result<(), StoreError> {
        ctx.run(async {
            let id = document_id(&document)?;
            let mut collections = self.write()?;
            let docs = collections.entry(self.name.clone()).or_default();
            if docs.contains_key(&id) {
                return Err(StoreError::DuplicateKey { id });
            }
            docs.insert(id, document);
            Ok(())
        })
        .await
    }

    async fn find_one_and_upsert(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
        replacement: Document,
    ) -> Result<Document, StoreError> {
        ctx.run(async {
            let matcher = Matcher::build(filter.expr())?;
            let id = document_id(&replacement)?;
            let mut collections = self.write()?;
            let docs = collections.entry(self.name.clone()).or_default();

            match Self::first_match(docs, &matcher) {
                Some(existing) if existing != id => {
                    return Err(StoreError::unavailable(format!(
                        "replacement would change immutable id '{}' to '{}'",
                        existing, id
                    )));
                }
                Some(_) => {}
                None if docs.contains_key(&id) => return Err(StoreError::DuplicateKey { id }),
                None => {}
            }

            docs.insert(id, replacement.clone());
            Ok(replacement)
        })
        .await
    }

    async fn find_one_and_delete(
        &self,
        ctx: &Context,
        filter: &CompiledFilter,
    ) -> Result<Option<Document>, StoreError> {
        ctx.run(async {
            let matcher = Matcher::build(filter.expr())?;
            let mut collections = self.write()?;
            let Some(docs) = collections.get_mut(&self.name) else {
                return Ok(None);
            };
            let first = Self::first_match(docs, &matcher);
            Ok(first.and_then(|id| docs.remove(&id)))
        })
        .await
    }
}

fn document_id(document: &Document) -> Result<String, StoreError> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::unavailable("document has no string 'id'"))
}

/// A [`FilterExpr`] prepared for repeated evaluation
enum Matcher {
    All,
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Eq { field: String, value: Value },
    Pattern { field: String, regex: Regex },
    Range {
        field: String,
        min: Option<Value>,
        max: Option<Value>,
    },
    In { field: String, values: Vec<Value> },
}

impl Matcher {
    fn build(expr: &FilterExpr) -> Result<Self, StoreError> {
        Ok(match expr {
            FilterExpr::All => Matcher::All,
            FilterExpr::And(exprs) => {
                Matcher::And(exprs.iter().map(Matcher::build).collect::<Result<_, _>>()?)
            }
            FilterExpr::Or(exprs) => {
                Matcher::Or(exprs.iter().map(Matcher::build).collect::<Result<_, _>>()?)
            }
            FilterExpr::Eq { field, value } => Matcher::Eq {
                field: field.clone(),
                value: value.clone(),
            },
            FilterExpr::Pattern { field, literal } => Matcher::Pattern {
                field: field.clone(),
                regex: RegexBuilder::new(&regex::escape(literal))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| StoreError::unavailable_with("invalid pattern", e))?,
            },
            FilterExpr::Range { field, min, max } => Matcher::Range {
                field: field.clone(),
                min: min.clone(),
                max: max.clone(),
            },
            FilterExpr::In { field, values } => Matcher::In {
                field: field.clone(),
                values: values.clone(),
            },
        })
    }

    fn matches(&self, doc: &Document) -> bool {
        match self {
            Matcher::All => true,
            Matcher::And(all) => all.iter().all(|m| m.matches(doc)),
            Matcher::Or(any) => any.iter().any(|m| m.matches(doc)),
            Matcher::Eq { field, value } => {
                compare_values(lookup(doc, field), value) == Ordering::Equal
            }
            Matcher::Pattern { field, regex } => lookup(doc, field)
                .as_str()
                .is_some_and(|text| regex.is_match(text)),
            Matcher::Range { field, min, max } => {
                let value = lookup(doc, field);
                let above = min.as_ref().is_none_or(|min| {
                    same_type(value, min) && compare_values(value, min) != Ordering::Less
                });
                let below = max.as_ref().is_none_or(|max| {
                    same_type(value, max) && compare_values(value, max) != Ordering::Greater
                });
                above && below
            }
            Matcher::In { field, values } => {
                let value = lookup(doc, field);
                values
                    .iter()
                    .any(|candidate| compare_values(value, candidate) == Ordering::Equal)
            }
        }
    }
}

static NULL: Value = Value::Null;

/// Value at a dotted path; a missing field reads as null
fn lookup<'a>(doc: &'a Document, path: &str) -> &'a Value {
    let mut parts = path.split('.');
    let Some(first) = parts.next() else {
        return &NULL;
    };
    let mut current = match doc.get(first) {
        Some(value) => value,
        None => return &NULL,
    };
    for part in parts {
        current = match current.get(part) {
            Some(value) => value,
            None => return &NULL,
        };
    }
    current
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn same_type(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

/// Total order over JSON values: null < bool < number < string < array < object
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(a, b)| compare_values(a, b))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y.iter())
            .map(|((ka, va), (kb, vb))| ka.cmp(kb).then_with(|| compare_values(va, vb)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn compare_numbers(x: &serde_json::Number, y: &serde_json::Number) -> Ordering {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a.cmp(&b);
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a.cmp(&b);
    }
    let a = x.as_f64().unwrap_or(f64::NAN);
    let b = y.as_f64().unwrap_or(f64::NAN);
    a.total_cmp(&b)
}

fn compare_documents(a: &Document, b: &Document, sort: &SortOrder) -> Ordering {
    for key in sort.keys() {
        let ord = compare_values(lookup(a, &key.field), lookup(b, &key.field));
        let ord = match key.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
