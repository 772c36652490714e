//! # Span Processor Interface
//!
//! Span processor is an interface which allows hooks for span start and end method
//! invocations.
//!
//! Built-in span processors are responsible for batching spans and passing
//! them to exporters.
//!
//! Span processors can be registered directly on SDK [`SdkTracerProvider`] and they are
//! invoked in the same order as they were registered.
//!
//! All `Tracer` instances created by a `SdkTracerProvider` share the same span processors.
//! Changes to this collection reflect in all `Tracer` instances.
//!
//! ```ascii
//!   +-----+--------------+   +-----------------------+   +-------------------+
//!   |     |              |   |                       |   |                   |
//!   |     |              |   | (Batch)SpanProcessor  |   |    SpanExporter   |
//!   |     |              +---> (Simple)SpanProcessor +--->                   |
//!   |     |              |   |                       |   |                   |
//!   | SDK | Tracer.span()|   +-----------------------+   +-------------------+
//!   |     | Span.end()   |
//!   +-----+--------------+
//! ```
//!
//! [`SdkTracerProvider`]: crate::trace::SdkTracerProvider

use crate::batch::{clamp_sizes, env_value, BatchSink, BatchWorker, WorkerConfig};
use crate::error::{SdkError, SdkResult};
use crate::resource::Resource;
use crate::trace::{Span, SpanData, SpanExporter};
use futures_executor::block_on;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use telemetry::{diag_debug, diag_error};

/// Delay interval between two consecutive exports.
pub(crate) const OTEL_BSP_SCHEDULE_DELAY: &str = "OTEL_BSP_SCHEDULE_DELAY";
/// Default delay interval between two consecutive exports.
pub(crate) const OTEL_BSP_SCHEDULE_DELAY_DEFAULT: u64 = 5_000;
/// Maximum queue size
pub(crate) const OTEL_BSP_MAX_QUEUE_SIZE: &str = "OTEL_BSP_MAX_QUEUE_SIZE";
/// Default maximum queue size
pub(crate) const OTEL_BSP_MAX_QUEUE_SIZE_DEFAULT: usize = 2_048;
/// Maximum batch size, must be less than or equal to OTEL_BSP_MAX_QUEUE_SIZE
pub(crate) const OTEL_BSP_MAX_EXPORT_BATCH_SIZE: &str = "OTEL_BSP_MAX_EXPORT_BATCH_SIZE";
/// Default maximum batch size
pub(crate) const OTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT: usize = 512;
/// Maximum allowed time to export data.
pub(crate) const OTEL_BSP_EXPORT_TIMEOUT: &str = "OTEL_BSP_EXPORT_TIMEOUT";
/// Default maximum allowed time to export data.
pub(crate) const OTEL_BSP_EXPORT_TIMEOUT_DEFAULT: u64 = 30_000;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// `SpanProcessor` is an interface which allows hooks for span start and end
/// method invocations.
pub trait SpanProcessor: Send + Sync + std::fmt::Debug {
    /// `on_start` is called when a `Span` is started. This method is called
    /// synchronously on the thread that started the span, therefore it should
    /// not block or throw exceptions.
    fn on_start(&self, _span: &mut Span) {}

    /// `on_end` is called after a `Span` is ended (i.e., the end timestamp is
    /// already set). This method is called synchronously within the `Span::end`
    /// API, therefore it should not block or throw an exception.
    fn on_end(&self, span: SpanData);

    /// Force the spans lying in the cache to be exported.
    fn force_flush(&self) -> SdkResult;

    /// Shuts down the processor. Called when SDK is shut down. This is an
    /// opportunity for processors to do any cleanup required.
    ///
    /// Implementation should make sure shutdown can be called multiple times.
    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult;

    /// shutdown the processor with a default timeout.
    fn shutdown(&self) -> SdkResult {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Set the resource for the span processor.
    fn set_resource(&mut self, _resource: &Resource) {}
}

/// A [SpanProcessor] that passes finished spans to the configured
/// `SpanExporter`, as soon as they are finished, without any batching. This is
/// typically useful for debugging and testing. For scenarios requiring higher
/// performance/throughput, consider using [BatchSpanProcessor].
///
/// The export runs on the thread that ends the span, under a mutex shared by
/// every caller.
#[derive(Debug)]
pub struct SimpleSpanProcessor<E: SpanExporter> {
    exporter: Mutex<E>,
    is_shutdown: AtomicBool,
}

impl<E: SpanExporter> SimpleSpanProcessor<E> {
    /// Create a new [SimpleSpanProcessor] using the provided exporter.
    pub fn new(exporter: E) -> Self {
        Self {
            exporter: Mutex::new(exporter),
            is_shutdown: AtomicBool::new(false),
        }
    }
}

impl<E: SpanExporter> SpanProcessor for SimpleSpanProcessor<E> {
    fn on_end(&self, span: SpanData) {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return;
        }

        let result = self
            .exporter
            .lock()
            .map_err(|_| SdkError::InternalFailure("SimpleSpanProcessor mutex poison".into()))
            .and_then(|exporter| block_on(exporter.export(vec![span])));

        if let Err(err) = result {
            diag_error!(
                name: "SimpleSpanProcessor.ExportError",
                error = err.to_string()
            );
        }
    }

    fn force_flush(&self) -> SdkResult {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Ok(());
        }
        self.exporter.lock()?.force_flush()
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            diag_debug!(name: "SimpleSpanProcessor.AlreadyShutdown");
            return Ok(());
        }
        self.exporter.lock()?.shutdown_with_timeout(timeout)
    }

    fn set_resource(&mut self, resource: &Resource) {
        if let Ok(mut exporter) = self.exporter.lock() {
            exporter.set_resource(resource);
        }
    }
}

/// Adapts a [SpanExporter] to the batch worker.
#[derive(Debug)]
struct SpanSink<E>(E);

impl<E: SpanExporter + 'static> BatchSink<SpanData> for SpanSink<E> {
    fn export(&mut self, batch: &mut Vec<SpanData>) -> SdkResult {
        block_on(self.0.export(std::mem::take(batch)))
    }

    fn force_flush(&mut self) -> SdkResult {
        self.0.force_flush()
    }

    fn shutdown(&mut self, timeout: Duration) -> SdkResult {
        self.0.shutdown_with_timeout(timeout)
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.0.set_resource(resource);
    }
}

/// A [`SpanProcessor`] that buffers finished spans and exports them in
/// batches from a dedicated background thread named `BatchSpanProcessor`.
///
/// `on_end` never blocks: when the queue (`max_queue_size`) is full the span
/// is dropped and counted in [`BatchSpanProcessor::dropped_count`]. A batch of
/// at most `max_export_batch_size` spans is exported when that many spans are
/// pending, when `scheduled_delay` has elapsed, and on `force_flush` or
/// `shutdown`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use telemetry_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, SdkTracerProvider};
/// # use telemetry_sdk::error::SdkResult;
/// # use telemetry_sdk::trace::{SpanData, SpanExporter};
/// # #[derive(Debug, Default)]
/// # struct ConsoleExporter;
/// # impl SpanExporter for ConsoleExporter {
/// #     async fn export(&self, batch: Vec<SpanData>) -> SdkResult {
/// #         println!("exporting {} spans", batch.len());
/// #         Ok(())
/// #     }
/// # }

/// let exporter = ConsoleExporter::default();
/// let processor = BatchSpanProcessor::builder(exporter)
///     .with_batch_config(
///         BatchConfigBuilder::default()
///             .with_max_queue_size(4096)
///             .with_scheduled_delay(Duration::from_millis(500))
///             .build(),
///     )
///     .build();
///
/// let provider = SdkTracerProvider::builder()
///     .with_span_processor(processor)
///     .build();
/// # provider.shutdown().unwrap();
/// ```
#[derive(Debug)]
pub struct BatchSpanProcessor {
    worker: BatchWorker<SpanData>,
}

impl BatchSpanProcessor {
    /// Creates a new instance of `BatchSpanProcessor`.
    pub fn new<E>(exporter: E, config: BatchConfig) -> Self
    where
        E: SpanExporter + 'static,
    {
        BatchSpanProcessor {
            worker: BatchWorker::new("BatchSpanProcessor", SpanSink(exporter), config.worker_config()),
        }
    }

    /// Create a new batch processor builder
    pub fn builder<E>(exporter: E) -> BatchSpanProcessorBuilder<E>
    where
        E: SpanExporter + 'static,
    {
        BatchSpanProcessorBuilder {
            exporter,
            config: BatchConfig::default(),
        }
    }

    /// Exports every span that ended before this call, waiting at most
    /// `timeout` for the export to finish.
    pub fn force_flush_with_timeout(&self, timeout: Duration) -> SdkResult {
        self.worker.force_flush_with_timeout(timeout)
    }

    /// Spans dropped because the queue was full.
    pub fn dropped_count(&self) -> usize {
        self.worker.dropped_count()
    }

    /// Batches the exporter failed to export.
    pub fn export_failures(&self) -> usize {
        self.worker.export_failures()
    }
}

impl SpanProcessor for BatchSpanProcessor {
    fn on_end(&self, span: SpanData) {
        self.worker.submit(span);
    }

    fn force_flush(&self) -> SdkResult {
        self.worker.force_flush()
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult {
        self.worker.shutdown_with_timeout(timeout)
    }

    /// Waits up to `max_export_timeout` for the final export.
    fn shutdown(&self) -> SdkResult {
        self.worker.shutdown()
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.worker.set_resource(resource);
    }
}

/// A builder for creating [`BatchSpanProcessor`] instances.
#[derive(Debug)]
pub struct BatchSpanProcessorBuilder<E>
where
    E: SpanExporter + 'static,
{
    exporter: E,
    config: BatchConfig,
}

impl<E> BatchSpanProcessorBuilder<E>
where
    E: SpanExporter + 'static,
{
    /// Set the BatchConfig for [BatchSpanProcessorBuilder]
    pub fn with_batch_config(self, config: BatchConfig) -> Self {
        BatchSpanProcessorBuilder { config, ..self }
    }

    /// Build a batch processor
    pub fn build(self) -> BatchSpanProcessor {
        BatchSpanProcessor::new(self.exporter, self.config)
    }
}

/// Batch span processor configuration.
/// Use [`BatchConfigBuilder`] to configure your own instance of [`BatchConfig`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// The maximum queue size to buffer spans for delayed processing. If the
    /// queue gets full it drops the spans. The default value of is 2048.
    pub(crate) max_queue_size: usize,

    /// The delay interval in milliseconds between two consecutive processing
    /// of batches. The default value is 5 seconds.
    pub(crate) scheduled_delay: Duration,

    /// The maximum number of spans to process in a single batch. If there are
    /// more than one batch worth of spans then it processes multiple batches
    /// of spans one batch after the other without any delay. The default value
    /// is 512.
    pub(crate) max_export_batch_size: usize,

    /// How long `force_flush` and `shutdown` wait for the worker. The default
    /// value is 30 seconds.
    pub(crate) max_export_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfigBuilder::default().build()
    }
}

impl BatchConfig {
    fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            max_queue_size: self.max_queue_size,
            max_export_batch_size: self.max_export_batch_size,
            scheduled_delay: self.scheduled_delay,
            max_export_timeout: self.max_export_timeout,
        }
    }
}

/// A builder for creating [`BatchConfig`] instances.
#[derive(Debug)]
pub struct BatchConfigBuilder {
    max_queue_size: usize,
    scheduled_delay: Duration,
    max_export_batch_size: usize,
    max_export_timeout: Duration,
}

impl Default for BatchConfigBuilder {
    /// Create a new [`BatchConfigBuilder`] initialized with the default batch config values.
    /// The values are overriden by environment variables if set.
    /// The supported environment variables are:
    /// * `OTEL_BSP_MAX_QUEUE_SIZE`
    /// * `OTEL_BSP_SCHEDULE_DELAY`
    /// * `OTEL_BSP_MAX_EXPORT_BATCH_SIZE`
    /// * `OTEL_BSP_EXPORT_TIMEOUT`
    fn default() -> Self {
        BatchConfigBuilder {
            max_queue_size: OTEL_BSP_MAX_QUEUE_SIZE_DEFAULT,
            scheduled_delay: Duration::from_millis(OTEL_BSP_SCHEDULE_DELAY_DEFAULT),
            max_export_batch_size: OTEL_BSP_MAX_EXPORT_BATCH_SIZE_DEFAULT,
            max_export_timeout: Duration::from_millis(OTEL_BSP_EXPORT_TIMEOUT_DEFAULT),
        }
        .init_from_env_vars()
    }
}

impl BatchConfigBuilder {
    /// Set max_queue_size for [`BatchConfigBuilder`].
    /// It's the maximum queue size to buffer spans for delayed processing.
    /// If the queue gets full it will drops the spans.
    /// The default value of is 2048.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set max_export_batch_size for [`BatchConfigBuilder`].
    /// It's the maximum number of spans to process in a single batch. The
    /// default value is 512.
    pub fn with_max_export_batch_size(mut self, max_export_batch_size: usize) -> Self {
        self.max_export_batch_size = max_export_batch_size;
        self
    }

    /// Set scheduled_delay_duration for [`BatchConfigBuilder`].
    /// It's the delay interval in milliseconds between two consecutive processing of batches.
    /// The default value is 5000 milliseconds.
    pub fn with_scheduled_delay(mut self, scheduled_delay: Duration) -> Self {
        self.scheduled_delay = scheduled_delay;
        self
    }

    /// Set max_export_timeout for [`BatchConfigBuilder`].
    /// It's the maximum duration to export a batch of data.
    /// The default value is 30000 milliseconds.
    pub fn with_max_export_timeout(mut self, max_export_timeout: Duration) -> Self {
        self.max_export_timeout = max_export_timeout;
        self
    }

    /// Builds a `BatchConfig` enforcing the following invariants:
    /// * `max_queue_size` and `max_export_batch_size` are at least 1; zero is
    ///   raised to 1 with a warning.
    /// * `max_export_batch_size` must be less than or equal to `max_queue_size`.
    pub fn build(self) -> BatchConfig {
        let (max_queue_size, max_export_batch_size) =
            clamp_sizes(self.max_queue_size, self.max_export_batch_size);

        BatchConfig {
            max_queue_size,
            scheduled_delay: self.scheduled_delay,
            max_export_timeout: self.max_export_timeout,
            max_export_batch_size,
        }
    }

    fn init_from_env_vars(mut self) -> Self {
        if let Some(max_queue_size) = env_value(OTEL_BSP_MAX_QUEUE_SIZE) {
            self.max_queue_size = max_queue_size;
        }

        if let Some(scheduled_delay) = env_value(OTEL_BSP_SCHEDULE_DELAY) {
            self.scheduled_delay = Duration::from_millis(scheduled_delay);
        }

        if let Some(max_export_batch_size) = env_value(OTEL_BSP_MAX_EXPORT_BATCH_SIZE) {
            self.max_export_batch_size = max_export_batch_size;
        }

        if let Some(max_export_timeout) = env_value(OTEL_BSP_EXPORT_TIMEOUT) {
            self.max_export_timeout = Duration::from_millis(max_export_timeout);
        }

        self
    }
}
