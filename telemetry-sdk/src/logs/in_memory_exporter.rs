use crate::error::{SdkError, SdkResult};
use crate::logs::SdkLogRecord;
use crate::logs::{LogBatch, LogExporter};
use crate::Resource;
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telemetry::InstrumentationScope;

type LogResult<T> = Result<T, SdkError>;

/// An in-memory logs exporter that stores logs data in memory.
///
/// This exporter is useful for testing and debugging purposes.
/// It stores logs in a `Vec<OwnedLogData>`. Logs can be retrieved using
/// `get_emitted_logs` method. Records survive `shutdown`, call
/// [`InMemoryLogExporter::reset`] to clear them.
///
/// # Example
/// ```
///# use telemetry_sdk::logs::{BatchLogProcessor, InMemoryLogExporter, SdkLoggerProvider};
///# use telemetry::logs::{Logger, LoggerProvider};
/// let exporter = InMemoryLogExporter::default();
/// let logger_provider = SdkLoggerProvider::builder()
///     .with_log_processor(BatchLogProcessor::builder(exporter.clone()).build())
///     .build();
///
/// let logger = logger_provider.logger("example");
/// logger.emit(logger.create_log_record());
///
/// logger_provider.force_flush().unwrap();
/// let emitted_logs = exporter.get_emitted_logs().unwrap();
/// assert_eq!(emitted_logs.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryLogExporter {
    logs: Arc<Mutex<Vec<OwnedLogData>>>,
    resource: Arc<Mutex<Resource>>,
    shutdown_calls: Arc<AtomicUsize>,
}

impl Default for InMemoryLogExporter {
    fn default() -> Self {
        InMemoryLogExporterBuilder::new().build()
    }
}

/// `OwnedLogData` represents a single log event without resource context.
#[derive(Debug, Clone)]
pub struct OwnedLogData {
    /// The exported record.
    pub record: SdkLogRecord,
    /// Instrumentation details for the emitter who produced this `LogEvent`.
    pub instrumentation: InstrumentationScope,
}

/// `LogDataWithResource` associates a [`SdkLogRecord`] with a [`Resource`] and
/// [`InstrumentationScope`].
#[derive(Clone, Debug)]
pub struct LogDataWithResource {
    /// Log record
    pub record: SdkLogRecord,
    /// Instrumentation details for the emitter who produced this `LogRecord`.
    pub instrumentation: InstrumentationScope,
    /// Resource for the emitter who produced this `LogRecord`.
    pub resource: Cow<'static, Resource>,
}

/// Builder for [`InMemoryLogExporter`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryLogExporterBuilder {}

impl InMemoryLogExporterBuilder {
    /// Creates a new instance of `InMemoryLogExporterBuilder`.
    pub fn new() -> Self {
        Self {}
    }

    /// Creates a new instance of `InMemoryLogExporter`.
    pub fn build(&self) -> InMemoryLogExporter {
        InMemoryLogExporter {
            logs: Arc::new(Mutex::new(Vec::new())),
            resource: Arc::new(Mutex::new(Resource::empty())),
            shutdown_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl InMemoryLogExporter {
    /// Returns the logs emitted via Logger as a vector of `LogDataWithResource`.
    pub fn get_emitted_logs(&self) -> LogResult<Vec<LogDataWithResource>> {
        let logs_guard = self.logs.lock()?;
        let resource_guard = self.resource.lock()?;
        let logs = logs_guard
            .iter()
            .map(|log_data| LogDataWithResource {
                record: log_data.record.clone(),
                resource: Cow::Owned(resource_guard.clone()),
                instrumentation: log_data.instrumentation.clone(),
            })
            .collect();

        Ok(logs)
    }

    /// Clears the internal (in-memory) storage of logs.
    pub fn reset(&self) {
        let _ = self.logs.lock().map(|mut logs_guard| logs_guard.clear());
    }

    /// How many times the exporter or one of its clones was shut down.
    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }
}

impl LogExporter for InMemoryLogExporter {
    async fn export(&self, batch: LogBatch<'_>) -> SdkResult {
        let mut logs_guard = self.logs.lock()?;
        for (log_record, instrumentation) in batch.iter() {
            logs_guard.push(OwnedLogData {
                record: log_record.clone(),
                instrumentation: instrumentation.clone(),
            });
        }
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
