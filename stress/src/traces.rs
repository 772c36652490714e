/*
    Starts and ends spans on every thread. Ended spans go through a
    processor that discards them, so this measures span creation, attribute
    handling and the `on_end` fan-out.
*/

use lazy_static::lazy_static;
use std::time::Duration;
use telemetry::{
    trace::{Span as _, SpanBuilder, Tracer, TracerProvider},
    KeyValue,
};
use telemetry_sdk::{
    error::SdkResult,
    trace::{self as sdktrace, SpanData, SpanProcessor},
};

mod throughput;

lazy_static! {
    static ref PROVIDER: sdktrace::SdkTracerProvider = sdktrace::SdkTracerProvider::builder()
        .with_span_processor(NoOpSpanProcessor {})
        .build();
    static ref TRACER: sdktrace::SdkTracer = PROVIDER.tracer("stress");
}

#[derive(Debug)]
pub struct NoOpSpanProcessor;

impl SpanProcessor for NoOpSpanProcessor {
    fn on_end(&self, _span: SpanData) {
        // No-op
    }

    fn force_flush(&self) -> SdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult {
        Ok(())
    }
}

fn main() {
    throughput::test_throughput(test_span);
}

fn test_span() {
    let span_builder = SpanBuilder::from_name("test_span").with_attributes(vec![
        KeyValue::new("attribute_at_span_start1", "value1"),
        KeyValue::new("attribute_at_span_start2", "value2"),
    ]);

    let mut span = TRACER.build(span_builder);
    span.set_attribute(KeyValue::new("key3", "value3"));
    span.set_attribute(KeyValue::new("key4", "value4"));
    span.end();
}
