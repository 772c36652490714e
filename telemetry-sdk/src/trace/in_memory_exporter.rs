use crate::error::{SdkError, SdkResult};
use crate::resource::Resource;
use crate::trace::{SpanData, SpanExporter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An in-memory span exporter that stores span data in memory.
///
/// This exporter is useful for testing and debugging purposes. It stores
/// span data in a `Vec<SpanData>`. Spans can be retrieved
/// using the `get_finished_spans` method.
/// # Example
/// ```
///# use telemetry::trace::{SpanKind, Span, Tracer, TracerProvider};
///# use telemetry_sdk::trace::{BatchSpanProcessor, InMemorySpanExporterBuilder, SdkTracerProvider};
///     let exporter = InMemorySpanExporterBuilder::new().build();
///     let provider = SdkTracerProvider::builder()
///         .with_span_processor(BatchSpanProcessor::builder(exporter.clone()).build())
///         .build();
///
///     let tracer = provider.tracer("example/in_memory_exporter");
///     let mut span = tracer
///         .span_builder("say hello")
///         .with_kind(SpanKind::Server)
///         .start(&tracer);
///     span.add_event("handling this...", Vec::new());
///     span.end();
///
///     provider.force_flush().unwrap();
///     let spans = exporter.get_finished_spans().unwrap();
///     assert_eq!(spans.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct InMemorySpanExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
    resource: Arc<Mutex<Resource>>,
    shutdown_calls: Arc<AtomicUsize>,
}

impl Default for InMemorySpanExporter {
    fn default() -> Self {
        InMemorySpanExporterBuilder::new().build()
    }
}

/// Builder for [`InMemorySpanExporter`].
/// # Example
/// ```
///# use telemetry_sdk::trace::InMemorySpanExporterBuilder;
///
/// let exporter = InMemorySpanExporterBuilder::new().build();
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemorySpanExporterBuilder {}

impl InMemorySpanExporterBuilder {
    /// Creates a new instance of the `InMemorySpanExporterBuilder`.
    pub fn new() -> Self {
        Self {}
    }

    /// Creates a new instance of the `InMemorySpanExporter`.
    pub fn build(&self) -> InMemorySpanExporter {
        InMemorySpanExporter {
            spans: Arc::new(Mutex::new(Vec::new())),
            resource: Arc::new(Mutex::new(Resource::empty())),
            shutdown_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl InMemorySpanExporter {
    /// Returns the finished span as a vector of `SpanData`.
    ///
    /// # Errors
    ///
    /// Returns an `InternalFailure` if the internal lock cannot be acquired.
    pub fn get_finished_spans(&self) -> Result<Vec<SpanData>, SdkError> {
        let spans = self.spans.lock()?;
        Ok(spans.clone())
    }

    /// Clears the internal storage of finished spans.
    pub fn reset(&self) {
        let _ = self.spans.lock().map(|mut spans_guard| spans_guard.clear());
    }

    /// The resource the exporter was last given.
    pub fn resource(&self) -> Option<Resource> {
        self.resource.lock().ok().map(|r| r.clone())
    }

    /// How many times the exporter or one of its clones was shut down.
    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }
}

impl SpanExporter for InMemorySpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> SdkResult {
        self.spans.lock()?.extend(batch);
        Ok(())
    }

    fn shutdown_with_timeout(&mut self, _timeout: Duration) -> SdkResult {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_resource(&mut self, resource: &Resource) {
        if let Ok(mut current) = self.resource.lock() {
            *current = resource.clone();
        }
    }
}
