use crate::trace::{self, noop::NoopTracerProvider, SpanBuilder, SpanContext, Status};
use crate::{diag_error, diag_info, InstrumentationScope, KeyValue};
use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::SystemTime;

/// Object safe counterpart of [`trace::Span`].
pub trait ObjectSafeSpan {
    /// Records an event at the given time.
    fn add_event_with_timestamp(
        &mut self,
        name: Cow<'static, str>,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    );

    /// Returns the [`SpanContext`] of the span.
    fn span_context(&self) -> &SpanContext;

    /// Returns true if the span is recording.
    fn is_recording(&self) -> bool;

    /// Sets a single attribute.
    fn set_attribute(&mut self, attribute: KeyValue);

    /// Sets the status.
    fn set_status(&mut self, status: Status);

    /// Renames the span.
    fn update_name(&mut self, new_name: Cow<'static, str>);

    /// Finishes the span at the given time.
    fn end_with_timestamp(&mut self, timestamp: SystemTime);
}

impl<T: trace::Span> ObjectSafeSpan for T {
    fn add_event_with_timestamp(
        &mut self,
        name: Cow<'static, str>,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) {
        trace::Span::add_event_with_timestamp(self, name, timestamp, attributes)
    }

    fn span_context(&self) -> &SpanContext {
        trace::Span::span_context(self)
    }

    fn is_recording(&self) -> bool {
        trace::Span::is_recording(self)
    }

    fn set_attribute(&mut self, attribute: KeyValue) {
        trace::Span::set_attribute(self, attribute)
    }

    fn set_status(&mut self, status: Status) {
        trace::Span::set_status(self, status)
    }

    fn update_name(&mut self, new_name: Cow<'static, str>) {
        trace::Span::update_name(self, new_name)
    }

    fn end_with_timestamp(&mut self, timestamp: SystemTime) {
        trace::Span::end_with_timestamp(self, timestamp)
    }
}

/// Wraps the [`BoxedTracer`]'s span so it can be used generically by
/// applications without knowing the underlying type.
pub struct BoxedSpan(Box<dyn ObjectSafeSpan + Send + Sync>);

impl fmt::Debug for BoxedSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedSpan")
    }
}

impl trace::Span for BoxedSpan {
    fn add_event_with_timestamp<T>(
        &mut self,
        name: T,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) where
        T: Into<Cow<'static, str>>,
    {
        self.0
            .add_event_with_timestamp(name.into(), timestamp, attributes)
    }

    fn span_context(&self) -> &SpanContext {
        self.0.span_context()
    }

    fn is_recording(&self) -> bool {
        self.0.is_recording()
    }

    fn set_attribute(&mut self, attribute: KeyValue) {
        self.0.set_attribute(attribute)
    }

    fn set_status(&mut self, status: Status) {
        self.0.set_status(status)
    }

    fn update_name<T>(&mut self, new_name: T)
    where
        T: Into<Cow<'static, str>>,
    {
        self.0.update_name(new_name.into())
    }

    fn end_with_timestamp(&mut self, timestamp: SystemTime) {
        self.0.end_with_timestamp(timestamp);
    }
}

/// Object safe counterpart of [`trace::Tracer`].
pub trait ObjectSafeTracer {
    /// Builds a span from the given builder and boxes it.
    fn build_boxed(&self, builder: SpanBuilder) -> Box<dyn ObjectSafeSpan + Send + Sync>;
}

impl<S, T> ObjectSafeTracer for T
where
    S: trace::Span + Send + Sync + 'static,
    T: trace::Tracer<Span = S>,
{
    fn build_boxed(&self, builder: SpanBuilder) -> Box<dyn ObjectSafeSpan + Send + Sync> {
        Box::new(self.build(builder))
    }
}

/// Wraps the global provider's tracer so applications can use it without
/// knowing the underlying type.
pub struct BoxedTracer(Box<dyn ObjectSafeTracer + Send + Sync>);

impl BoxedTracer {
    /// Create a `BoxedTracer` from an object-safe tracer.
    pub fn new(tracer: Box<dyn ObjectSafeTracer + Send + Sync>) -> Self {
        BoxedTracer(tracer)
    }
}

impl fmt::Debug for BoxedTracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedTracer")
    }
}

impl trace::Tracer for BoxedTracer {
    type Span = BoxedSpan;

    fn build(&self, builder: SpanBuilder) -> Self::Span {
        BoxedSpan(self.0.build_boxed(builder))
    }
}

/// Object safe counterpart of [`trace::TracerProvider`].
pub trait ObjectSafeTracerProvider {
    /// Returns a boxed tracer for the given scope.
    fn boxed_tracer(&self, scope: InstrumentationScope) -> Box<dyn ObjectSafeTracer + Send + Sync>;
}

impl<S, T, P> ObjectSafeTracerProvider for P
where
    S: trace::Span + Send + Sync + 'static,
    T: trace::Tracer<Span = S> + Send + Sync + 'static,
    P: trace::TracerProvider<Tracer = T>,
{
    fn boxed_tracer(&self, scope: InstrumentationScope) -> Box<dyn ObjectSafeTracer + Send + Sync> {
        Box::new(self.tracer_with_scope(scope))
    }
}

/// Represents the globally configured [`TracerProvider`] instance.
///
/// [`TracerProvider`]: crate::trace::TracerProvider
#[derive(Clone)]
pub struct GlobalTracerProvider {
    provider: Arc<dyn ObjectSafeTracerProvider + Send + Sync>,
}

impl fmt::Debug for GlobalTracerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GlobalTracerProvider")
    }
}

impl GlobalTracerProvider {
    fn new<P>(provider: P) -> Self
    where
        P: ObjectSafeTracerProvider + Send + Sync + 'static,
    {
        GlobalTracerProvider {
            provider: Arc::new(provider),
        }
    }
}

impl trace::TracerProvider for GlobalTracerProvider {
    type Tracer = BoxedTracer;

    fn tracer_with_scope(&self, scope: InstrumentationScope) -> Self::Tracer {
        BoxedTracer(self.provider.boxed_tracer(scope))
    }
}

static GLOBAL_TRACER_PROVIDER: OnceLock<RwLock<GlobalTracerProvider>> = OnceLock::new();

#[inline]
fn global_tracer_provider() -> &'static RwLock<GlobalTracerProvider> {
    GLOBAL_TRACER_PROVIDER
        .get_or_init(|| RwLock::new(GlobalTracerProvider::new(NoopTracerProvider::new())))
}

/// Returns an instance of the currently configured global tracer provider.
///
/// Before [`set_tracer_provider`] is called this is a no-op provider.
pub fn tracer_provider() -> GlobalTracerProvider {
    match global_tracer_provider().read() {
        Ok(provider) => provider.clone(),
        Err(_) => {
            diag_error!(name: "TracerProvider.GlobalGetFailed");
            GlobalTracerProvider::new(NoopTracerProvider::new())
        }
    }
}

/// Creates a named instance of [`trace::Tracer`] via the configured
/// [`GlobalTracerProvider`].
///
/// This is a more convenient way of expressing
/// `global::tracer_provider().tracer(name)`.
pub fn tracer(name: impl Into<Cow<'static, str>>) -> BoxedTracer {
    use trace::TracerProvider;
    tracer_provider().tracer(name)
}

/// Sets the given tracer provider as the current global provider.
///
/// The previous provider is not shut down; the caller owns its lifecycle.
pub fn set_tracer_provider<P, T, S>(new_provider: P)
where
    S: trace::Span + Send + Sync + 'static,
    T: trace::Tracer<Span = S> + Send + Sync + 'static,
    P: trace::TracerProvider<Tracer = T> + Send + Sync + 'static,
{
    match global_tracer_provider().write() {
        Ok(mut provider) => {
            *provider = GlobalTracerProvider::new(new_provider);
            diag_info!(name: "TracerProvider.GlobalSet");
        }
        Err(_) => {
            diag_error!(name: "TracerProvider.GlobalSetFailed");
        }
    }
}
