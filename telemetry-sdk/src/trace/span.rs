//! # Span
//!
//! `Span`s represent a single operation within a trace. `Span`s can be nested to form a trace
//! tree. Each trace contains a root span, which typically describes the end-to-end latency and,
//! optionally, one or more sub-spans for its sub-operations.
//!
//! The `Span`'s start and end timestamps reflect the elapsed real time of the operation. A `Span`'s
//! start time is set to the current time on span creation. After the `Span` is created, it
//! is possible to change its name, set its attributes, and add events.
//! These cannot be changed after the `Span`'s end time has been set.
use crate::trace::{SdkTracer, SpanData};
use std::borrow::Cow;
use std::time::SystemTime;
use telemetry::trace::{Event, SpanContext, Status};
use telemetry::KeyValue;

/// Single operation within a trace.
///
/// The span is handed to every registered processor when it ends, either
/// through [`end`](telemetry::trace::Span::end) or when it is dropped.
#[derive(Debug)]
pub struct Span {
    span_context: SpanContext,
    data: Option<SpanData>,
    tracer: SdkTracer,
}

impl Span {
    pub(crate) fn new(span_context: SpanContext, data: Option<SpanData>, tracer: SdkTracer) -> Self {
        Span {
            span_context,
            data,
            tracer,
        }
    }

    /// Operate on a mutable reference to span data
    fn with_data<T, F>(&mut self, f: F) -> Option<T>
    where
        F: FnOnce(&mut SpanData) -> T,
    {
        self.data.as_mut().map(f)
    }

    /// Convert information in this span into `SpanData`.
    /// This function copies all data from the current span, which will create a
    /// overhead.
    pub fn exported_data(&self) -> Option<SpanData> {
        self.data.clone()
    }

    fn ensure_ended_and_exported(&mut self, timestamp: Option<SystemTime>) {
        // Take data, skip if it has already been exported
        let mut data = match self.data.take() {
            Some(data) => data,
            None => return,
        };
        data.end_time = timestamp.unwrap_or_else(telemetry::time::now);
        self.tracer.pipeline().on_end(data);
    }
}

impl telemetry::trace::Span for Span {
    /// Records events at a specific time in the context of a given `Span`.
    fn add_event_with_timestamp<T>(
        &mut self,
        name: T,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) where
        T: Into<Cow<'static, str>>,
    {
        self.with_data(|data| data.events.push(Event::new(name, timestamp, attributes)));
    }

    /// Returns the `SpanContext` for the given `Span`.
    fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    /// Returns true if this `Span` is recording information like events with the `add_event`
    /// operation, attributes using `set_attributes`, status with `set_status`, etc.
    /// Always returns false after span `end`.
    fn is_recording(&self) -> bool {
        self.data.is_some()
    }

    /// Sets a single attribute, replacing any earlier value for the same key.
    fn set_attribute(&mut self, attribute: KeyValue) {
        self.with_data(|data| {
            match data.attributes.iter_mut().find(|kv| kv.key == attribute.key) {
                Some(existing) => existing.value = attribute.value,
                None => data.attributes.push(attribute),
            }
        });
    }

    /// Sets the status of this `Span`.
    ///
    /// If used, this will override the default span status, which is [`Status::Unset`].
    fn set_status(&mut self, status: Status) {
        self.with_data(|data| {
            // These values form a total order: Ok > Error > Unset.
            if status > data.status {
                data.status = status;
            }
        });
    }

    /// Updates the `Span`'s name.
    fn update_name<T>(&mut self, new_name: T)
    where
        T: Into<Cow<'static, str>>,
    {
        self.with_data(|data| {
            data.name = new_name.into();
        });
    }

    /// Finishes the span with given timestamp.
    fn end_with_timestamp(&mut self, timestamp: SystemTime) {
        self.ensure_ended_and_exported(Some(timestamp));
    }
}

impl Drop for Span {
    /// Report span on inner drop
    fn drop(&mut self) {
        self.ensure_ended_and_exported(None);
    }
}

#[cfg(test)]
mod tests {
    use crate::trace::{InMemorySpanExporter, SdkTracerProvider};
    use std::time::{Duration, UNIX_EPOCH};
    use telemetry::trace::{Span as _, Status, Tracer, TracerProvider};
    use telemetry::KeyValue;

    fn provider() -> (SdkTracerProvider, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (provider, exporter)
    }

    #[test]
    fn set_attribute_overwrites_same_key() {
        let (provider, exporter) = provider();
        let mut span = provider.tracer("test").start("op");
        span.set_attribute(KeyValue::new("k", 1_i64));
        span.set_attribute(KeyValue::new("other", true));
        span.set_attribute(KeyValue::new("k", 2_i64));
        span.end();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(
            spans[0].attributes,
            vec![KeyValue::new("k", 2_i64), KeyValue::new("other", true)]
        );
    }

    #[test]
    fn status_only_moves_forward() {
        let (provider, exporter) = provider();
        let mut span = provider.tracer("test").start("op");
        span.set_status(Status::Ok);
        span.set_status(Status::error("late"));
        drop(span);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans[0].status, Status::Ok);
    }

    #[test]
    fn ended_span_stops_recording_and_exports_once() {
        let (provider, exporter) = provider();
        let mut span = provider.tracer("test").start("op");
        assert!(span.is_recording());

        let end = UNIX_EPOCH + Duration::from_secs(10);
        span.update_name("renamed");
        span.add_event("checkpoint", vec![KeyValue::new("step", 1_i64)]);
        span.end_with_timestamp(end);
        assert!(!span.is_recording());

        span.set_attribute(KeyValue::new("ignored", true));
        span.end();
        drop(span);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "renamed");
        assert_eq!(spans[0].end_time, end);
        assert_eq!(spans[0].events.len(), 1);
        assert!(spans[0].attributes.is_empty());
    }
}
