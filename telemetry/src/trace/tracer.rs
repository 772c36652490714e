use std::borrow::Cow;
use std::time::SystemTime;

use crate::trace::{SpanContext, SpanKind, Status};
use crate::KeyValue;

/// The interface for constructing [`Span`]s.
pub trait Tracer {
    /// The [`Span`] type used by this tracer.
    type Span: Span;

    /// Starts a new [`Span`] with default options and no parent.
    fn start<T>(&self, name: T) -> Self::Span
    where
        T: Into<Cow<'static, str>>,
    {
        self.build(SpanBuilder::from_name(name))
    }

    /// Creates a span builder.
    fn span_builder<T>(&self, name: T) -> SpanBuilder
    where
        T: Into<Cow<'static, str>>,
    {
        SpanBuilder::from_name(name)
    }

    /// Start a [`Span`] from a [`SpanBuilder`].
    fn build(&self, builder: SpanBuilder) -> Self::Span;
}

/// `SpanBuilder` allows span attributes to be configured before the span
/// has started.
#[derive(Clone, Debug, Default)]
pub struct SpanBuilder {
    /// Span name
    pub name: Cow<'static, str>,

    /// Span kind
    pub span_kind: Option<SpanKind>,

    /// Span start time
    pub start_time: Option<SystemTime>,

    /// Span attributes that are provided at the span creation time.
    pub attributes: Option<Vec<KeyValue>>,

    /// Explicit parent. Without one the span starts a new trace.
    pub parent: Option<SpanContext>,
}

impl SpanBuilder {
    /// Create a new span builder from a span name
    pub fn from_name<T: Into<Cow<'static, str>>>(name: T) -> Self {
        SpanBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Assign span kind
    pub fn with_kind(self, span_kind: SpanKind) -> Self {
        SpanBuilder {
            span_kind: Some(span_kind),
            ..self
        }
    }

    /// Assign span start time
    pub fn with_start_time<T: Into<SystemTime>>(self, start_time: T) -> Self {
        SpanBuilder {
            start_time: Some(start_time.into()),
            ..self
        }
    }

    /// Assign span attributes from an iterable.
    pub fn with_attributes<I>(self, attributes: I) -> Self
    where
        I: IntoIterator<Item = KeyValue>,
    {
        SpanBuilder {
            attributes: Some(attributes.into_iter().collect()),
            ..self
        }
    }

    /// Assign the parent span.
    pub fn with_parent(self, parent: SpanContext) -> Self {
        SpanBuilder {
            parent: Some(parent),
            ..self
        }
    }

    /// Builds a span with the given tracer from this configuration.
    pub fn start<T: Tracer>(self, tracer: &T) -> T::Span {
        tracer.build(self)
    }
}

/// The interface for a single operation within a trace.
///
/// A span records until [`Span::end`] is called; implementations end
/// unfinished spans when they are dropped.
pub trait Span {
    /// Record an event in the context of this span.
    fn add_event<T>(&mut self, name: T, attributes: Vec<KeyValue>)
    where
        T: Into<Cow<'static, str>>,
    {
        self.add_event_with_timestamp(name, crate::time::now(), attributes)
    }

    /// Record an event with a timestamp in the context of this span.
    fn add_event_with_timestamp<T>(
        &mut self,
        name: T,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) where
        T: Into<Cow<'static, str>>;

    /// A reference to the [`SpanContext`] for this span.
    fn span_context(&self) -> &SpanContext;

    /// Returns `true` if this span is recording information.
    ///
    /// Spans stop recording once ended, or when no processor is interested in
    /// them.
    fn is_recording(&self) -> bool;

    /// Set an attribute of this span. Setting an existing key overwrites it.
    fn set_attribute(&mut self, attribute: KeyValue);

    /// Set multiple attributes of this span.
    fn set_attributes(&mut self, attributes: impl IntoIterator<Item = KeyValue>) {
        if self.is_recording() {
            for attr in attributes.into_iter() {
                self.set_attribute(attr);
            }
        }
    }

    /// Sets the status of this `Span`.
    ///
    /// If used, this will override the default span status, which is
    /// [`Status::Unset`]. A status only moves forward (`Unset` → `Error` →
    /// `Ok`).
    fn set_status(&mut self, status: Status);

    /// Updates the span's name.
    fn update_name<T>(&mut self, new_name: T)
    where
        T: Into<Cow<'static, str>>;

    /// Signals that the operation described by this span has now ended.
    fn end(&mut self) {
        self.end_with_timestamp(crate::time::now());
    }

    /// Signals that the operation described by this span ended at the given
    /// time.
    fn end_with_timestamp(&mut self, timestamp: SystemTime);
}
