//! No-op trace implementation
//!
//! Returned as the global tracer provider until one is registered. Spans it
//! creates do not record anything.
use crate::trace::{self, SpanContext};
use crate::{InstrumentationScope, KeyValue};
use std::borrow::Cow;
use std::time::SystemTime;

/// A no-op instance of a `TracerProvider`.
#[derive(Clone, Debug, Default)]
pub struct NoopTracerProvider {
    _private: (),
}

impl NoopTracerProvider {
    /// Create a new no-op tracer provider
    pub fn new() -> Self {
        NoopTracerProvider { _private: () }
    }
}

impl trace::TracerProvider for NoopTracerProvider {
    type Tracer = NoopTracer;

    fn tracer_with_scope(&self, _scope: InstrumentationScope) -> Self::Tracer {
        NoopTracer::new()
    }
}

/// A no-op instance of a `Span`.
#[derive(Clone, Debug, Default)]
pub struct NoopSpan {
    _private: (),
}

impl NoopSpan {
    /// The default `NoopSpan`, as a constant
    pub const DEFAULT: NoopSpan = NoopSpan { _private: () };
}

impl trace::Span for NoopSpan {
    fn add_event_with_timestamp<T>(
        &mut self,
        _name: T,
        _timestamp: SystemTime,
        _attributes: Vec<KeyValue>,
    ) where
        T: Into<Cow<'static, str>>,
    {
        // Ignored
    }

    fn span_context(&self) -> &SpanContext {
        &SpanContext::NONE
    }

    fn is_recording(&self) -> bool {
        false
    }

    fn set_attribute(&mut self, _attribute: KeyValue) {
        // Ignored
    }

    fn set_status(&mut self, _status: trace::Status) {
        // Ignored
    }

    fn update_name<T>(&mut self, _new_name: T)
    where
        T: Into<Cow<'static, str>>,
    {
        // Ignored
    }

    fn end_with_timestamp(&mut self, _timestamp: SystemTime) {
        // Ignored
    }
}

/// A no-op instance of a `Tracer`.
#[derive(Clone, Debug, Default)]
pub struct NoopTracer {
    _private: (),
}

impl NoopTracer {
    /// Create a new no-op tracer
    pub fn new() -> Self {
        NoopTracer { _private: () }
    }
}

impl trace::Tracer for NoopTracer {
    type Span = NoopSpan;

    fn build(&self, _builder: trace::SpanBuilder) -> Self::Span {
        NoopSpan::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Span, Tracer, TracerProvider};

    #[test]
    fn noop_spans_never_record() {
        let tracer = NoopTracerProvider::new().tracer("noop");
        let mut span = tracer.start("op");
        span.set_attribute(KeyValue::new("k", 1));
        assert!(!span.is_recording());
        assert!(!span.span_context().is_valid());
        span.end();
    }
}
