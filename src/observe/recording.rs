//! In-memory [`Tracer`] that records finished spans, for tests

use crate::core::error::ErrorKind;
use crate::observe::span::{AttrValue, Span, Tracer};
use std::sync::{Arc, Mutex, MutexGuard};

/// A span as seen by [`RecordingTracer`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSpan {
    pub name: String,
    pub attributes: Vec<(&'static str, AttrValue)>,
    pub error: Option<(ErrorKind, String)>,
    pub ended: bool,
}

impl RecordedSpan {
    /// Last value recorded for `key`
    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|(kind, _)| *kind)
    }
}

/// Records every span it starts, in start order
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spans(&self) -> Vec<RecordedSpan> {
        lock(&self.spans).clone()
    }

    /// Most recent span with `name`
    pub fn last(&self, name: &str) -> Option<RecordedSpan> {
        lock(&self.spans)
            .iter()
            .rev()
            .find(|span| span.name == name)
            .cloned()
    }

    pub fn clear(&self) {
        lock(&self.spans).clear();
    }
}

impl Tracer for RecordingTracer {
    fn start(&self, name: &str) -> Box<dyn Span> {
        let mut spans = lock(&self.spans);
        spans.push(RecordedSpan {
            name: name.to_string(),
            attributes: Vec::new(),
            error: None,
            ended: false,
        });
        Box::new(RecordingSpan {
            index: spans.len() - 1,
            spans: Arc::clone(&self.spans),
        })
    }
}

struct RecordingSpan {
    index: usize,
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl RecordingSpan {
    fn update(&self, f: impl FnOnce(&mut RecordedSpan)) {
        if let Some(span) = lock(&self.spans).get_mut(self.index) {
            f(span);
        }
    }
}

impl Span for RecordingSpan {
    fn set_attribute(&mut self, key: &'static str, value: AttrValue) {
        self.update(|span| span.attributes.push((key, value)));
    }

    fn record_error(&mut self, kind: ErrorKind, message: &str) {
        self.update(|span| span.error = Some((kind, message.to_string())));
    }

    fn end(&mut self) {
        self.update(|span| span.ended = true);
    }
}

fn lock(spans: &Mutex<Vec<RecordedSpan>>) -> MutexGuard<'_, Vec<RecordedSpan>> {
    spans.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
