//! Trace exporters
use crate::error::SdkResult;
use crate::Resource;
use std::borrow::Cow;
use std::fmt::Debug;
use std::future::Future;
use std::time::{Duration, SystemTime};
use telemetry::trace::{Event, SpanContext, SpanId, SpanKind, Status};
use telemetry::{InstrumentationScope, KeyValue};

/// `SpanExporter` defines the interface that protocol-specific exporters must
/// implement so that they can be plugged into the SDK and support sending of
/// telemetry data.
///
/// Exporters are driven from a single thread at a time: the
/// [`SimpleSpanProcessor`] serializes calls under a mutex and the
/// [`BatchSpanProcessor`] calls them from its worker. The returned future is
/// polled to completion with `futures_executor::block_on`.
///
/// [`SimpleSpanProcessor`]: crate::trace::SimpleSpanProcessor
/// [`BatchSpanProcessor`]: crate::trace::BatchSpanProcessor
pub trait SpanExporter: Send + Sync + Debug {
    /// Exports a batch of readable spans.
    ///
    /// A failure is logged by the caller and the batch is dropped; it is
    /// never retried.
    fn export(&self, batch: Vec<SpanData>) -> impl Future<Output = SdkResult> + Send;

    /// Shuts down the exporter. Called when the SDK is shut down.
    ///
    /// Repeated calls must return `Ok(())` without side effects.
    fn shutdown_with_timeout(&mut self, _timeout: Duration) -> SdkResult {
        Ok(())
    }

    /// Shuts down the exporter with a default timeout.
    fn shutdown(&mut self) -> SdkResult {
        self.shutdown_with_timeout(Duration::from_secs(5))
    }

    /// Exports any buffered spans.
    fn force_flush(&mut self) -> SdkResult {
        Ok(())
    }

    /// Set the resource for the exporter.
    fn set_resource(&mut self, _resource: &Resource) {}
}

/// `SpanData` contains all the information collected by a span and can be
/// used by exporters as a standard input.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    /// Exportable `SpanContext`
    pub span_context: SpanContext,
    /// Span parent id, [`SpanId::INVALID`] for root spans.
    pub parent_span_id: SpanId,
    /// Span kind
    pub span_kind: SpanKind,
    /// Span name
    pub name: Cow<'static, str>,
    /// Span start time
    pub start_time: SystemTime,
    /// Span end time
    pub end_time: SystemTime,
    /// Span attributes
    pub attributes: Vec<KeyValue>,
    /// Span events
    pub events: Vec<Event>,
    /// Span status
    pub status: Status,
    /// Instrumentation scope that produced this span
    pub instrumentation_scope: InstrumentationScope,
}
