//! Observability: spans, structured logs and the operation decorator

pub mod instrument;
pub mod logging;
pub mod recording;
pub mod span;

pub use instrument::{Call, Instrumenter, ResultSummary};
pub use logging::init_logging;
pub use recording::{RecordedSpan, RecordingTracer};
pub use span::{ActiveSpan, AttrValue, Span, Tracer, TracingTracer};
