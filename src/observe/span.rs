//! Tracing boundary: span factory and span handles
//!
//! The repository core only talks to [`Tracer`] and [`Span`]. The default
//! [`TracingTracer`] maps them onto `tracing` spans, so whichever subscriber or
//! OpenTelemetry layer the process installs decides where spans go.

use crate::core::error::ErrorKind;
use std::fmt;

/// Value of a span attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        AttrValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

/// One operation's span
pub trait Span: Send {
    fn set_attribute(&mut self, key: &'static str, value: AttrValue);

    fn record_error(&mut self, kind: ErrorKind, message: &str);

    /// Close the span. Called exactly once.
    fn end(&mut self);

    /// The `tracing` span log events should be emitted under, if any
    fn tracing_span(&self) -> tracing::Span {
        tracing::Span::none()
    }
}

/// Span factory
pub trait Tracer: Send + Sync {
    fn start(&self, name: &str) -> Box<dyn Span>;
}

/// Scoped span: ends the underlying span on drop, on every exit path
pub struct ActiveSpan {
    inner: Option<Box<dyn Span>>,
}

impl ActiveSpan {
    pub fn new(span: Box<dyn Span>) -> Self {
        Self { inner: Some(span) }
    }

    pub fn set_attribute(&mut self, key: &'static str, value: impl Into<AttrValue>) {
        if let Some(span) = self.inner.as_mut() {
            span.set_attribute(key, value.into());
        }
    }

    pub fn record_error(&mut self, kind: ErrorKind, message: &str) {
        if let Some(span) = self.inner.as_mut() {
            span.record_error(kind, message);
        }
    }

    pub fn tracing_span(&self) -> tracing::Span {
        self.inner
            .as_ref()
            .map(|span| span.tracing_span())
            .unwrap_or_else(tracing::Span::none)
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        if let Some(mut span) = self.inner.take() {
            span.end();
        }
    }
}

/// [`Tracer`] backed by the `tracing` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl Tracer for TracingTracer {
    fn start(&self, name: &str) -> Box<dyn Span> {
        let span = tracing::info_span!(
            "repository_operation",
            otel.name = %name,
            otel.status_code = tracing::field::Empty,
            repository = tracing::field::Empty,
            operation = tracing::field::Empty,
            entity.id = tracing::field::Empty,
            search.text = tracing::field::Empty,
            query.page = tracing::field::Empty,
            query.page_size = tracing::field::Empty,
            query.field = tracing::field::Empty,
            query.value = tracing::field::Empty,
            result.count = tracing::field::Empty,
            result.total = tracing::field::Empty,
            result.found = tracing::field::Empty,
            result.deleted = tracing::field::Empty,
            error.kind = tracing::field::Empty,
            error.message = tracing::field::Empty,
        );
        Box::new(TracingSpan { span: Some(span) })
    }
}

struct TracingSpan {
    span: Option<tracing::Span>,
}

impl Span for TracingSpan {
    fn set_attribute(&mut self, key: &'static str, value: AttrValue) {
        let Some(span) = &self.span else { return };
        // Keys not declared in `TracingTracer::start` are ignored by `tracing`.
        match value {
            AttrValue::Str(s) => span.record(key, s.as_str()),
            AttrValue::Int(i) => span.record(key, i),
            AttrValue::Bool(b) => span.record(key, b),
        };
    }

    fn record_error(&mut self, kind: ErrorKind, message: &str) {
        let Some(span) = &self.span else { return };
        span.record("otel.status_code", "ERROR");
        span.record("error.kind", kind.as_str());
        span.record("error.message", message);
    }

    fn end(&mut self) {
        self.span = None;
    }

    fn tracing_span(&self) -> tracing::Span {
        self.span.clone().unwrap_or_else(tracing::Span::none)
    }
}
