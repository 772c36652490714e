//! # Tracing API
//!
//! A [`TracerProvider`] hands out [`Tracer`]s for an instrumentation scope;
//! tracers start [`Span`]s, and a span is handed to the SDK's processors when
//! it ends. Context propagation is outside this crate: parents are passed
//! explicitly through [`SpanBuilder::with_parent`].

use std::borrow::Cow;
use std::time::SystemTime;

use crate::KeyValue;

pub mod noop;
mod span_context;
mod tracer;
mod tracer_provider;

pub use self::{
    span_context::{SpanContext, SpanId, TraceId},
    tracer::{Span, SpanBuilder, Tracer},
    tracer_provider::TracerProvider,
};

/// The relationship between a span, its parents and its children.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// A synchronous outgoing remote call.
    Client,
    /// A synchronous incoming remote call.
    Server,
    /// The initiator of an asynchronous request.
    Producer,
    /// The handler of an asynchronous request.
    Consumer,
    /// An operation that does not cross a process boundary.
    #[default]
    Internal,
}

/// The status of a span.
///
/// Ordered `Unset < Error < Ok`; a span only moves forward along that order.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    /// The default status.
    #[default]
    Unset,

    /// The operation contains an error.
    Error {
        /// The description of the error
        description: Cow<'static, str>,
    },

    /// The operation has been validated by an application developer or
    /// operator to have completed successfully.
    Ok,
}

impl Status {
    /// Create a new error status with a given description.
    pub fn error(description: impl Into<Cow<'static, str>>) -> Self {
        Status::Error {
            description: description.into(),
        }
    }
}

/// A timestamped annotation recorded on a span.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Event {
    /// The name of this event.
    pub name: Cow<'static, str>,
    /// The time at which this event occurred.
    pub timestamp: SystemTime,
    /// Attributes that describe this event.
    pub attributes: Vec<KeyValue>,
}

impl Event {
    /// Create new `Event`
    pub fn new<T: Into<Cow<'static, str>>>(
        name: T,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) -> Self {
        Event {
            name: name.into(),
            timestamp,
            attributes,
        }
    }
}
