//! # Tracer
//!
//! The tracer is responsible for creating [`Span`]s. Every span it starts is
//! announced to the provider's processors, and handed to them again when it
//! ends.
use crate::trace::provider::TracerProviderState;
use crate::trace::{Span, SpanData};
use std::fmt;
use std::sync::Arc;
use telemetry::trace::{SpanBuilder, SpanContext, SpanId, Status};
use telemetry::InstrumentationScope;

/// `Tracer` implementation to create and manage spans
#[derive(Clone)]
pub struct SdkTracer {
    inner: Arc<TracerInner>,
}

struct TracerInner {
    scope: InstrumentationScope,
    state: Arc<TracerProviderState>,
}

impl fmt::Debug for SdkTracer {
    /// Formats the `Tracer` using the given formatter.
    /// Omitting `provider` here is necessary to avoid cycles.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkTracer")
            .field("name", &self.inner.scope.name())
            .field("version", &self.inner.scope.version())
            .finish()
    }
}

impl SdkTracer {
    pub(crate) fn new(scope: InstrumentationScope, state: Arc<TracerProviderState>) -> Self {
        SdkTracer {
            inner: Arc::new(TracerInner { scope, state }),
        }
    }

    pub(crate) fn pipeline(&self) -> &TracerProviderState {
        &self.inner.state
    }

    /// Instrumentation scope of this tracer.
    pub fn instrumentation_scope(&self) -> &InstrumentationScope {
        &self.inner.scope
    }

    #[cfg(test)]
    pub(crate) fn same_handle(&self, other: &SdkTracer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl telemetry::trace::Tracer for SdkTracer {
    /// This implementation of `Tracer` produces `sdk::Span` instances.
    type Span = Span;

    /// Starts a span from a `SpanBuilder`.
    ///
    /// A span with a valid parent joins the parent's trace, any other span
    /// starts a new one. Once the provider is shut down the span is created
    /// without recording anything.
    fn build(&self, builder: SpanBuilder) -> Self::Span {
        let state = self.pipeline();
        let id_generator = state.id_generator();

        let (trace_id, parent_span_id) = match builder.parent.as_ref().filter(|p| p.is_valid()) {
            Some(parent) => (parent.trace_id(), parent.span_id()),
            None => (id_generator.new_trace_id(), SpanId::INVALID),
        };
        let span_context = SpanContext::new(trace_id, id_generator.new_span_id(), false);

        if state.is_shutdown() {
            return Span::new(span_context, None, self.clone());
        }

        let start_time = builder.start_time.unwrap_or_else(telemetry::time::now);
        let data = SpanData {
            span_context: span_context.clone(),
            parent_span_id,
            span_kind: builder.span_kind.unwrap_or_default(),
            name: builder.name,
            start_time,
            end_time: start_time,
            attributes: builder.attributes.unwrap_or_default(),
            events: Vec::new(),
            status: Status::Unset,
            instrumentation_scope: self.inner.scope.clone(),
        };

        let mut span = Span::new(span_context, Some(data), self.clone());
        state.on_start(&mut span);
        span
    }
}
