//! # Trace SDK
//!
//! The tracing SDK consists of a few main structs:
//!
//! * The [`SdkTracer`] struct which performs all tracing operations.
//! * The [`Span`] struct with is a mutable object storing information about the
//!   current operation execution.
//! * The [`SdkTracerProvider`] struct which configures and produces [`SdkTracer`]s.
//!
//! Finished spans go to the provider's [`SpanProcessor`]s in registration
//! order; the built-in [`SimpleSpanProcessor`] and [`BatchSpanProcessor`]
//! hand them to a [`SpanExporter`].
mod export;
mod id_generator;
mod provider;
mod span;
mod span_processor;
mod tracer;

pub use export::{SpanData, SpanExporter};
pub use id_generator::{IdGenerator, RandomIdGenerator};
pub use provider::{SdkTracerProvider, TracerProviderBuilder};
pub use span::Span;
pub use span_processor::{
    BatchConfig, BatchConfigBuilder, BatchSpanProcessor, BatchSpanProcessorBuilder,
    SimpleSpanProcessor, SpanProcessor,
};
pub use tracer::SdkTracer;

#[cfg(any(feature = "testing", test))]
mod in_memory_exporter;
#[cfg(any(feature = "testing", test))]
pub use in_memory_exporter::{InMemorySpanExporter, InMemorySpanExporterBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use telemetry::trace::{Span as _, Tracer, TracerProvider};
    use telemetry::{global, KeyValue};

    #[test]
    fn batch_exporter_receives_spans_from_many_threads() {
        const THREADS: usize = 4;
        const SPANS: usize = 250;

        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_span_processor(
                BatchSpanProcessor::builder(exporter.clone())
                    .with_batch_config(
                        BatchConfigBuilder::default()
                            .with_max_queue_size(THREADS * SPANS)
                            .with_max_export_batch_size(64)
                            .build(),
                    )
                    .build(),
            )
            .build();

        thread::scope(|s| {
            for t in 0..THREADS {
                let tracer = provider.tracer("worker");
                s.spawn(move || {
                    for i in 0..SPANS {
                        let mut span = tracer.start("op");
                        span.set_attribute(KeyValue::new("thread", t as i64));
                        span.set_attribute(KeyValue::new("i", i as i64));
                    }
                });
            }
        });

        provider.shutdown().unwrap();
        assert_eq!(exporter.get_finished_spans().unwrap().len(), THREADS * SPANS);
    }

    #[test]
    fn global_tracer_routes_to_registered_provider() {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        global::set_tracer_provider(provider.clone());

        let tracer = global::tracer("global-test");
        let mut span = tracer.start("via-global");
        span.end();

        let spans = exporter.get_finished_spans().unwrap();
        assert!(spans.iter().any(|s| s.name == "via-global"));
        provider.shutdown().unwrap();
    }

    #[derive(Debug, Clone, Default)]
    struct SlowExporter {
        exported: Arc<AtomicUsize>,
    }

    impl SpanExporter for SlowExporter {
        async fn export(&self, batch: Vec<SpanData>) -> crate::error::SdkResult {
            thread::sleep(Duration::from_millis(50));
            self.exported.fetch_add(batch.len(), Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropping_provider_flushes_batch_processor() {
        let exporter = SlowExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter.clone())
            .build();
        let tracer = provider.tracer("test");
        for _ in 0..10 {
            tracer.start("op").end();
        }

        let start = std::time::Instant::now();
        drop(tracer);
        drop(provider);
        assert_eq!(exporter.exported.load(Ordering::SeqCst), 10);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
