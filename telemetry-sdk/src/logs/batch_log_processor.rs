//! # Batch Log Processor
//!
//! The `BatchLogProcessor` is one implementation of the `LogProcessor` interface.
//!
//! It buffers log records and sends them to the exporter
//! in batches. This processor is designed for **production use** in high-throughput
//! applications and reduces the overhead of frequent exports by using a background
//! thread for batch processing.
//!
//! ## Diagram
//!
//! ```ascii
//!   +-----+---------------+   +-----------------------+   +-------------------+
//!   |     |               |   |                       |   |                   |
//!   | SDK | Logger.emit() +--->  (Batch)LogProcessor  +--->  LogExporter      |
//!   +-----+---------------+   +-----------------------+   +-------------------+
//! ```

use crate::batch::{clamp_sizes, env_value, BatchSink, BatchWorker, WorkerConfig};
use crate::error::SdkResult;
use crate::{
    logs::{LogBatch, LogExporter, LogProcessor, SdkLogRecord},
    Resource,
};
use futures_executor::block_on;
use std::time::Duration;
use telemetry::InstrumentationScope;

/// Delay interval between two consecutive exports.
pub(crate) const OTEL_BLRP_SCHEDULE_DELAY: &str = "OTEL_BLRP_SCHEDULE_DELAY";
/// Default delay interval between two consecutive exports.
pub(crate) const OTEL_BLRP_SCHEDULE_DELAY_DEFAULT: u64 = 1_000;
/// Maximum allowed time to export data.
pub(crate) const OTEL_BLRP_EXPORT_TIMEOUT: &str = "OTEL_BLRP_EXPORT_TIMEOUT";
/// Default maximum allowed time to export data.
pub(crate) const OTEL_BLRP_EXPORT_TIMEOUT_DEFAULT: u64 = 30_000;
/// Maximum queue size.
pub(crate) const OTEL_BLRP_MAX_QUEUE_SIZE: &str = "OTEL_BLRP_MAX_QUEUE_SIZE";
/// Default maximum queue size.
pub(crate) const OTEL_BLRP_MAX_QUEUE_SIZE_DEFAULT: usize = 2_048;
/// Maximum batch size, must be less than or equal to OTEL_BLRP_MAX_QUEUE_SIZE.
pub(crate) const OTEL_BLRP_MAX_EXPORT_BATCH_SIZE: &str = "OTEL_BLRP_MAX_EXPORT_BATCH_SIZE";
/// Default maximum batch size.
pub(crate) const OTEL_BLRP_MAX_EXPORT_BATCH_SIZE_DEFAULT: usize = 512;

type LogsData = Box<(SdkLogRecord, InstrumentationScope)>;

/// Adapts a [LogExporter] to the batch worker.
#[derive(Debug)]
struct LogSink<E>(E);

impl<E: LogExporter + 'static> BatchSink<LogsData> for LogSink<E> {
    fn export(&mut self, batch: &mut Vec<LogsData>) -> SdkResult {
        block_on(self.0.export(LogBatch::new_with_owned_data(batch)))
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

/// The `BatchLogProcessor` collects finished logs in a buffer and exports them
/// in batches to the configured `LogExporter`. This processor is ideal for
/// high-throughput environments, as it minimizes the overhead of exporting logs
/// individually. It uses a **dedicated background thread** named
/// `BatchLogProcessor` to manage and export logs asynchronously, ensuring that
/// the application's main execution flow is not blocked.
///
/// The processor supports the following configurations:
/// - **Queue size**: Maximum number of log records that can be buffered.
/// - **Batch size**: Maximum number of log records to include in a single export.
/// - **Scheduled delay**: Frequency at which the batch is exported.
///
/// `BatchLogProcessor` buffers logs in memory and exports them in batches. An
/// export is triggered when `max_export_batch_size` is reached or every
/// `scheduled_delay` milliseconds. Users can explicitly trigger an export using
/// the `force_flush` method. Shutdown also triggers an export of all buffered
/// logs and is recommended to be called before the application exits to ensure
/// all buffered logs are exported.
///
/// **Warning**: When using tokio's current-thread runtime, `shutdown()`, which
/// is a blocking call, should not be called from your main thread. This can
/// cause deadlock. Instead, call `shutdown()` from a separate thread or use
/// tokio's `spawn_blocking`.
///
/// ### Using a BatchLogProcessor:
///
/// ```rust
/// use std::time::Duration;
/// use telemetry_sdk::logs::{BatchConfigBuilder, BatchLogProcessor, SdkLoggerProvider};
/// # use telemetry_sdk::error::SdkResult;
/// # use telemetry_sdk::logs::{LogBatch, LogExporter};
/// # #[derive(Debug, Default)]
/// # struct ConsoleExporter;
/// # impl LogExporter for ConsoleExporter {
/// #     async fn export(&self, batch: LogBatch<'_>) -> SdkResult {
/// #         println!("exporting {} records", batch.len());
/// #         Ok(())
/// #     }
/// # }

/// let exporter = ConsoleExporter::default();
///
/// let processor = BatchLogProcessor::builder(exporter)
///     .with_batch_config(
///         BatchConfigBuilder::default()
///             .with_max_queue_size(2048)
///             .with_max_export_batch_size(512)
///             .with_scheduled_delay(Duration::from_secs(5))
///             .build(),
///     )
///     .build();
///
/// let provider = SdkLoggerProvider::builder()
///     .with_log_processor(processor)
///     .build();
/// # provider.shutdown().unwrap();
/// ```
#[derive(Debug)]
pub struct BatchLogProcessor {
    worker: BatchWorker<LogsData>,
}

impl BatchLogProcessor {
    /// Creates a new instance of `BatchLogProcessor`.
    pub fn new<E>(exporter: E, config: BatchConfig) -> Self
    where
        E: LogExporter + Send + Sync + 'static,
    {
        BatchLogProcessor {
            worker: BatchWorker::new("BatchLogProcessor", LogSink(exporter), config.worker_config()),
        }
    }

    /// Create a new batch processor builder
    pub fn builder<E>(exporter: E) -> BatchLogProcessorBuilder<E>
    where
        E: LogExporter,
    {
        BatchLogProcessorBuilder {
            exporter,
            config: Default::default(),
        }
    }

    /// Exports every record emitted before this call, waiting at most
    /// `timeout` for the export to finish.
    pub fn force_flush_with_timeout(&self, timeout: Duration) -> SdkResult {
        self.worker.force_flush_with_timeout(timeout)
    }

    /// Log records dropped because the queue was full.
    pub fn dropped_count(&self) -> usize {
        self.worker.dropped_count()
    }

    /// Batches the exporter failed to export.
    pub fn export_failures(&self) -> usize {
        self.worker.export_failures()
    }
}

impl LogProcessor for BatchLogProcessor {
    fn emit(&self, record: &mut SdkLogRecord, instrumentation: &InstrumentationScope) {
        self.worker
            .submit(Box::new((record.clone(), instrumentation.clone())));
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

/// A builder for creating [`BatchLogProcessor`] instances.
///
#[derive(Debug)]
pub struct BatchLogProcessorBuilder<E> {
    exporter: E,
    config: BatchConfig,
}

impl<E> BatchLogProcessorBuilder<E>
where
    E: LogExporter + 'static,
{
    /// Set the BatchConfig for [`BatchLogProcessorBuilder`]
    pub fn with_batch_config(self, config: BatchConfig) -> Self {
        BatchLogProcessorBuilder { config, ..self }
    }

    /// Build a batch processor
    pub fn build(self) -> BatchLogProcessor {
        BatchLogProcessor::new(self.exporter, self.config)
    }
}

/// Batch log processor configuration.
/// Use [`BatchConfigBuilder`] to configure your own instance of [`BatchConfig`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// The maximum queue size to buffer logs for delayed processing. If the
    /// queue gets full it drops the logs. The default value of is 2048.
    pub(crate) max_queue_size: usize,

    /// The delay interval in milliseconds between two consecutive processing
    /// of batches. The default value is 1 second.
    pub(crate) scheduled_delay: Duration,

    /// The maximum number of logs to process in a single batch. If there are
    /// more than one batch worth of logs then it processes multiple batches
    /// of logs one batch after the other without any delay. The default value
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
    /// * `OTEL_BLRP_MAX_QUEUE_SIZE`
    /// * `OTEL_BLRP_SCHEDULE_DELAY`
    /// * `OTEL_BLRP_MAX_EXPORT_BATCH_SIZE`
    /// * `OTEL_BLRP_EXPORT_TIMEOUT`
    fn default() -> Self {
        BatchConfigBuilder {
            max_queue_size: OTEL_BLRP_MAX_QUEUE_SIZE_DEFAULT,
            scheduled_delay: Duration::from_millis(OTEL_BLRP_SCHEDULE_DELAY_DEFAULT),
            max_export_batch_size: OTEL_BLRP_MAX_EXPORT_BATCH_SIZE_DEFAULT,
            max_export_timeout: Duration::from_millis(OTEL_BLRP_EXPORT_TIMEOUT_DEFAULT),
        }
        .init_from_env_vars()
    }
}

impl BatchConfigBuilder {
    /// Set max_queue_size for [`BatchConfigBuilder`].
    /// It's the maximum queue size to buffer logs for delayed processing.
    /// If the queue gets full it will drop the logs.
    /// The default value of is 2048.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Set scheduled_delay for [`BatchConfigBuilder`].
    /// It's the delay interval in milliseconds between two consecutive processing of batches.
    /// The default value is 1000 milliseconds.
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

    /// Set max_export_batch_size for [`BatchConfigBuilder`].
    /// It's the maximum number of logs to process in a single batch. If there are
    /// more than one batch worth of logs then it processes multiple batches
    /// of logs one batch after the other without any delay.
    /// The default value is 512.
    pub fn with_max_export_batch_size(mut self, max_export_batch_size: usize) -> Self {
        self.max_export_batch_size = max_export_batch_size;
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
        if let Some(max_queue_size) = env_value(OTEL_BLRP_MAX_QUEUE_SIZE) {
            self.max_queue_size = max_queue_size;
        }

        if let Some(max_export_batch_size) = env_value(OTEL_BLRP_MAX_EXPORT_BATCH_SIZE) {
            self.max_export_batch_size = max_export_batch_size;
        }

        if let Some(scheduled_delay) = env_value(OTEL_BLRP_SCHEDULE_DELAY) {
            self.scheduled_delay = Duration::from_millis(scheduled_delay);
        }

        if let Some(max_export_timeout) = env_value(OTEL_BLRP_EXPORT_TIMEOUT) {
            self.max_export_timeout = Duration::from_millis(max_export_timeout);
        }

        self
    }
}
