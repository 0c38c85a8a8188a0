//! The observability wrapper applied around every repository operation
//!
//! [`Instrumenter::instrument`] takes an operation future and returns an
//! equivalent future with the cross-cutting behavior injected:
//!
//! 1. open span `<repository>.<operation>` and record the call's inputs
//! 2. await the operation
//! 3. on success record a result summary; on failure record the error and wrap
//!    the cause into a [`RepositoryError`] carrying the same identifiers
//! 4. emit one structured log event with the identifiers the span carries
//! 5. end the span, including when the future is dropped or unwinds midway

use crate::core::error::{Cause, ErrorKind, Operation, RepositoryError};
use crate::core::query::{Page, QuerySpec};
use crate::observe::span::{ActiveSpan, Tracer, TracingTracer};
use std::future::Future;
use std::sync::Arc;

/// Inputs describing one repository call
#[derive(Debug, Clone)]
pub struct Call {
    repository: &'static str,
    operation: Operation,
    id: Option<String>,
    search_text: Option<String>,
    field: Option<String>,
    value: Option<String>,
    page: Option<(u64, u64)>,
}

impl Call {
    pub fn new(repository: &'static str, operation: Operation) -> Self {
        Self {
            repository,
            operation,
            id: None,
            search_text: None,
            field: None,
            value: None,
            page: None,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn search_text(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// The value a field lookup matches; strings are kept unquoted
    pub fn value(mut self, value: &serde_json::Value) -> Self {
        self.value = Some(match value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        });
        self
    }

    pub fn query(mut self, spec: &QuerySpec) -> Self {
        self.page = Some((spec.page, spec.page_size));
        if self.search_text.is_none() {
            self.search_text = spec.search.clone();
        }
        self
    }

    fn page_number(&self) -> Option<u64> {
        self.page.map(|(page, _)| page)
    }

    fn page_size(&self) -> Option<u64> {
        self.page.map(|(_, page_size)| page_size)
    }

    pub fn span_name(&self) -> String {
        format!("{}.{}", self.repository, self.operation)
    }

    fn record_inputs(&self, span: &mut ActiveSpan) {
        span.set_attribute("repository", self.repository);
        span.set_attribute("operation", self.operation.as_str());
        if let Some(id) = &self.id {
            span.set_attribute("entity.id", id.as_str());
        }
        if let Some(text) = &self.search_text {
            span.set_attribute("search.text", text.as_str());
        }
        if let Some(field) = &self.field {
            span.set_attribute("query.field", field.as_str());
        }
        if let Some(value) = &self.value {
            span.set_attribute("query.value", value.as_str());
        }
        if let Some((page, page_size)) = self.page {
            span.set_attribute("query.page", page);
            span.set_attribute("query.page_size", page_size);
        }
    }

    fn wrap(&self, cause: Cause) -> RepositoryError {
        let mut err = RepositoryError::new(self.repository, self.operation, cause);
        if let Some(id) = &self.id {
            err = err.with_id(id.clone());
        }
        if let (Some(field), Some(value)) = (&self.field, &self.value) {
            err = err.with_lookup(field.clone(), value.clone());
        }
        if let Some(text) = &self.search_text {
            err = err.with_search_text(text.clone());
        }
        err
    }
}

/// What a successful operation returned, for span attributes and logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultSummary {
    pub count: Option<u64>,
    pub total: Option<u64>,
    pub found: Option<bool>,
    pub deleted: Option<bool>,
}

impl ResultSummary {
    pub fn page<T>(page: &Page<T>) -> Self {
        Self {
            count: Some(page.items.len() as u64),
            total: Some(page.total_count),
            ..Self::default()
        }
    }

    pub fn lookup<T>(found: &Option<T>) -> Self {
        Self {
            count: Some(u64::from(found.is_some())),
            found: Some(found.is_some()),
            ..Self::default()
        }
    }

    pub fn written() -> Self {
        Self {
            count: Some(1),
            ..Self::default()
        }
    }

    pub fn deletion(deleted: bool) -> Self {
        Self {
            count: Some(u64::from(deleted)),
            deleted: Some(deleted),
            ..Self::default()
        }
    }

    fn record(&self, span: &mut ActiveSpan) {
        if let Some(count) = self.count {
            span.set_attribute("result.count", count);
        }
        if let Some(total) = self.total {
            span.set_attribute("result.total", total);
        }
        if let Some(found) = self.found {
            span.set_attribute("result.found", found);
        }
        if let Some(deleted) = self.deleted {
            span.set_attribute("result.deleted", deleted);
        }
    }
}

/// Decorator injecting span and log behavior around operation futures
#[derive(Clone)]
pub struct Instrumenter {
    tracer: Arc<dyn Tracer>,
}

impl Default for Instrumenter {
    fn default() -> Self {
        Self::new(Arc::new(TracingTracer))
    }
}

impl std::fmt::Debug for Instrumenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumenter").finish_non_exhaustive()
    }
}

impl Instrumenter {
    pub fn new(tracer: Arc<dyn Tracer>) -> Self {
        Self { tracer }
    }

    /// Run `operation` inside span `call.span_name()`
    ///
    /// `summarize` describes a successful output for the span and the log.
    pub async fn instrument<O, F, S>(
        &self,
        call: Call,
        summarize: S,
        operation: F,
    ) -> Result<O, RepositoryError>
    where
        F: Future<Output = Result<O, Cause>>,
        S: FnOnce(&O) -> ResultSummary,
    {
        let name = call.span_name();
        let mut span = ActiveSpan::new(self.tracer.start(&name));
        call.record_inputs(&mut span);

        let mut guard = CompletionGuard {
            call: &call,
            name: &name,
            completed: false,
        };
        let outcome = tracing::Instrument::instrument(operation, span.tracing_span()).await;
        guard.completed = true;

        let _entered = span.tracing_span().entered();
        match outcome {
            Ok(output) => {
                let summary = summarize(&output);
                summary.record(&mut span);
                tracing::info!(
                    repository = call.repository,
                    operation = call.operation.as_str(),
                    entity.id = call.id.as_deref(),
                    search.text = call.search_text.as_deref(),
                    query.field = call.field.as_deref(),
                    query.value = call.value.as_deref(),
                    query.page = call.page_number(),
                    query.page_size = call.page_size(),
                    result.count = summary.count,
                    result.total = summary.total,
                    result.found = summary.found,
                    result.deleted = summary.deleted,
                    "[{}] completed",
                    name
                );
                Ok(output)
            }
            Err(cause) => {
                let err = call.wrap(cause);
                let kind = err.kind();
                let message = err.to_string();
                span.record_error(kind, &message);
                log_failure(&call, &name, kind, &message);
                Err(err)
            }
        }
    }
}

fn log_failure(call: &Call, name: &str, kind: ErrorKind, message: &str) {
    if kind.is_caller_error() || kind == ErrorKind::Cancelled {
        tracing::warn!(
            repository = call.repository,
            operation = call.operation.as_str(),
            entity.id = call.id.as_deref(),
            search.text = call.search_text.as_deref(),
            query.field = call.field.as_deref(),
            query.value = call.value.as_deref(),
            query.page = call.page_number(),
            query.page_size = call.page_size(),
            error.kind = kind.as_str(),
            error.message = message,
            "[{}] failed",
            name
        );
    } else {
        tracing::error!(
            repository = call.repository,
            operation = call.operation.as_str(),
            entity.id = call.id.as_deref(),
            search.text = call.search_text.as_deref(),
            query.field = call.field.as_deref(),
            query.value = call.value.as_deref(),
            query.page = call.page_number(),
            query.page_size = call.page_size(),
            error.kind = kind.as_str(),
            error.message = message,
            "[{}] failed",
            name
        );
    }
}

/// Logs an operation whose future was dropped or unwound before finishing
struct CompletionGuard<'a> {
    call: &'a Call,
    name: &'a str,
    completed: bool,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            log_failure(
                self.call,
                self.name,
                ErrorKind::Cancelled,
                "operation abandoned before completion",
            );
        }
    }
}
