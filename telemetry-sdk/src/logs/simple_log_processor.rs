//! # Simple Log Processor
//!
//! The `SimpleLogProcessor` is one implementation of the `LogProcessor` interface.
//!
//! It forwards log records to the exporter immediately after they are emitted
//! (or one exporter after another if multiple are configured). This processor is
//! **synchronous** and is designed for debugging or testing purposes. It is **not
//! suitable for production** environments due to its lack of batching,
//! performance optimizations, or support for high-throughput scenarios.
//!
//! ## Diagram
//!
//! ```ascii
//!   +-----+---------------+   +-----------------------+   +-------------------+
//!   |     |               |   |                       |   |                   |
//!   | SDK | Logger.emit() +---> (Simple)LogProcessor  +--->  LogExporter      |
//!   +-----+---------------+   +-----------------------+   +-------------------+
//! ```

use crate::error::{SdkError, SdkResult};
use crate::logs::log_processor::LogProcessor;
use crate::{
    logs::{LogBatch, LogExporter, SdkLogRecord},
    Resource,
};

use telemetry::{diag_debug, diag_error, diag_warn, InstrumentationScope};

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A [`LogProcessor`] designed for testing and debugging purpose, that immediately
/// exports log records as they are emitted. Log records are exported synchronously
/// in the same thread that emits the log record.
///
/// # Example
///
/// ```
/// use telemetry_sdk::logs::{SdkLoggerProvider, SimpleLogProcessor};
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
/// let provider = SdkLoggerProvider::builder()
///     .with_log_processor(SimpleLogProcessor::new(exporter))
///     .build();
/// # provider.shutdown().unwrap();
/// ```
#[derive(Debug)]
pub struct SimpleLogProcessor<T: LogExporter> {
    exporter: Mutex<T>,
    is_shutdown: AtomicBool,
}

impl<T: LogExporter> SimpleLogProcessor<T> {
    /// Creates a new instance of `SimpleLogProcessor`.
    pub fn new(exporter: T) -> Self {
        SimpleLogProcessor {
            exporter: Mutex::new(exporter),
            is_shutdown: AtomicBool::new(false),
        }
    }
}

impl<T: LogExporter> LogProcessor for SimpleLogProcessor<T> {
    fn emit(&self, record: &mut SdkLogRecord, instrumentation: &InstrumentationScope) {
        // noop after shutdown
        if self.is_shutdown.load(Ordering::Relaxed) {
            // this is a warning, as the user is trying to log after the processor has been shutdown
            diag_warn!(name: "SimpleLogProcessor.Emit.ProcessorShutdown");
            return;
        }

        let result = self
            .exporter
            .lock()
            .map_err(|_| SdkError::InternalFailure("SimpleLogProcessor mutex poison".into()))
            .and_then(|exporter| {
                let log_tuple = &[(record as &SdkLogRecord, instrumentation)];
                futures_executor::block_on(exporter.export(LogBatch::new(log_tuple)))
            });
        // Handle errors with specific static names
        match result {
            Err(SdkError::InternalFailure(_)) => {
                // logging as debug as this is not a user error
                diag_debug!(name: "SimpleLogProcessor.Emit.MutexPoisoning");
            }
            Err(err) => {
                diag_error!(
                    name: "SimpleLogProcessor.Emit.ExportError",
                    error = err.to_string()
                );
            }
            _ => {}
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
            diag_debug!(name: "SimpleLogProcessor.AlreadyShutdown");
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

#[cfg(test)]
mod tests {
    use crate::logs::log_processor::tests::MockLogExporter;
    use crate::logs::{InMemoryLogExporter, LogProcessor, SdkLogRecord, SimpleLogProcessor};
    use crate::Resource;
    use std::sync::{Arc, Mutex};
    use telemetry::logs::{AnyValue, LogRecord};
    use telemetry::InstrumentationScope;

    #[test]
    fn test_simple_shutdown() {
        let exporter = InMemoryLogExporter::default();
        let processor = SimpleLogProcessor::new(exporter.clone());

        let mut record: SdkLogRecord = SdkLogRecord::default();
        let instrumentation: InstrumentationScope = Default::default();

        processor.emit(&mut record, &instrumentation);

        processor.shutdown().unwrap();

        let is_shutdown = processor
            .is_shutdown
            .load(std::sync::atomic::Ordering::Relaxed);
        assert!(is_shutdown);

        processor.emit(&mut record, &instrumentation);

        assert_eq!(1, exporter.get_emitted_logs().unwrap().len());
        assert!(processor.shutdown().is_ok());
        assert_eq!(exporter.shutdown_calls(), 1);
    }

    #[test]
    fn test_simple_processor_sync_exporter_without_runtime() {
        let exporter = InMemoryLogExporter::default();
        let processor = SimpleLogProcessor::new(exporter.clone());

        let mut record: SdkLogRecord = SdkLogRecord::default();
        record.set_body(AnyValue::from("message"));
        let instrumentation = InstrumentationScope::builder("scope").build();

        processor.emit(&mut record, &instrumentation);

        let logs = exporter.get_emitted_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].record.body(), Some(&AnyValue::from("message")));
        assert_eq!(logs[0].instrumentation.name(), "scope");
    }

    #[test]
    fn test_set_resource_forwards_to_exporter() {
        let exporter = MockLogExporter {
            resource: Arc::new(Mutex::new(None)),
        };
        let mut processor = SimpleLogProcessor::new(exporter.clone());
        processor.set_resource(&Resource::builder_empty().with_service_name("svc").build());
        assert!(exporter.get_resource().is_some());
    }
}
