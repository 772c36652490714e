use super::{BatchLogProcessor, LogExporter, LogProcessor, SdkLogRecord, SdkLogger, SimpleLogProcessor};
use crate::error::{combine_results, SdkResult};
use crate::scope_cache::ScopeCache;
use crate::Resource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use telemetry::{diag_debug, diag_error, diag_info, diag_warn, InstrumentationScope};

/// State shared by a provider and every logger it issued.
#[derive(Debug)]
pub(crate) struct LoggerProviderState {
    processors: RwLock<Vec<Box<dyn LogProcessor>>>,
    resource: Resource,
    is_shutdown: AtomicBool,
}

impl LoggerProviderState {
    fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::Relaxed)
    }

    /// Passes `record` through every processor, in registration order.
    pub(crate) fn emit(&self, record: &mut SdkLogRecord, scope: &InstrumentationScope) {
        if self.is_shutdown() {
            return;
        }
        if let Ok(processors) = self.processors.read() {
            for processor in processors.iter() {
                processor.emit(record, scope);
            }
        }
    }

    fn add_processor(&self, mut processor: Box<dyn LogProcessor>) {
        if self.is_shutdown() {
            diag_warn!(
                name: "LoggerProvider.AddProcessorAfterShutdown",
                message = "log processor is ignored, the provider is shut down"
            );
            return;
        }
        processor.set_resource(&self.resource);
        match self.processors.write() {
            Ok(mut processors) => processors.push(processor),
            Err(_) => diag_error!(name: "LoggerProvider.AddProcessorFailed"),
        }
    }

    fn force_flush(&self) -> SdkResult {
        if self.is_shutdown() {
            return Ok(());
        }
        let processors = self.processors.read()?;
        combine_results(processors.iter().map(|p| p.force_flush()).collect())
    }

    fn shutdown(&self) -> SdkResult {
        if self
            .is_shutdown
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            diag_debug!(name: "LoggerProvider.AlreadyShutdown");
            return Ok(());
        }
        let processors = self.processors.read()?;
        let mut results = Vec::with_capacity(processors.len());
        for processor in processors.iter() {
            let result = processor.shutdown();
            if let Err(err) = &result {
                diag_debug!(
                    name: "LoggerProvider.ShutdownError",
                    error = err.to_string()
                );
            }
            results.push(result);
        }
        combine_results(results)
    }
}

#[derive(Debug)]
struct LoggerProviderInner {
    state: Arc<LoggerProviderState>,
    loggers: ScopeCache<SdkLogger>,
}

impl Drop for LoggerProviderInner {
    fn drop(&mut self) {
        if self.state.is_shutdown() {
            diag_debug!(
                name: "LoggerProvider.Drop.AlreadyShutdown",
                message = "LoggerProvider was already shut down; drop will not attempt shutdown again."
            );
        } else if let Err(err) = self.state.shutdown() {
            diag_error!(
                name: "LoggerProvider.Drop.ShutdownFailed",
                reason = err.to_string()
            );
        }
    }
}

/// Handles the creation and coordination of [`SdkLogger`]s.
///
/// All `Logger`s created by a `SdkLoggerProvider` share the same
/// [`LogProcessor`]s and [`Resource`]. Cloning the provider is cheap. Its
/// processors are shut down when [`SdkLoggerProvider::shutdown`] is called
/// or the last clone is dropped.
///
/// # Examples
///
/// ```
/// use telemetry::global;
/// use telemetry::logs::{AnyValue, LogRecord, Logger, LoggerProvider, Severity};
/// use telemetry_sdk::logs::SdkLoggerProvider;
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

/// let provider = SdkLoggerProvider::builder()
///     .with_simple_exporter(ConsoleExporter::default())
///     .build();
/// global::set_logger_provider(provider.clone());
///
/// let logger = provider.logger("my_app");
/// let mut record = logger.create_log_record();
/// record.set_severity_number(Severity::Warn);
/// record.set_body(AnyValue::from("disk almost full"));
/// logger.emit(record);
///
/// provider.shutdown().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SdkLoggerProvider {
    inner: Arc<LoggerProviderInner>,
}

impl Default for SdkLoggerProvider {
    fn default() -> Self {
        SdkLoggerProvider::builder().build()
    }
}

impl telemetry::logs::LoggerProvider for SdkLoggerProvider {
    type Logger = SdkLogger;

    fn logger_with_scope(&self, scope: InstrumentationScope) -> Self::Logger {
        if scope.name().is_empty() {
            diag_info!(name: "LoggerNameEmpty",  message = "Logger name is empty; consider providing a meaningful name. Logger will function normally and the provided name will be used as-is.");
        };
        let state = &self.inner.state;
        self.inner
            .loggers
            .get_or_insert_with(scope, |scope| SdkLogger::new(scope.clone(), Arc::clone(state)))
    }
}

impl SdkLoggerProvider {
    /// Create a new `LoggerProvider` builder.
    pub fn builder() -> LoggerProviderBuilder {
        LoggerProviderBuilder::default()
    }

    /// Appends `processor`. Records emitted from now on reach it.
    pub fn add_processor<T: LogProcessor + 'static>(&self, processor: T) {
        self.inner.state.add_processor(Box::new(processor));
    }

    /// Appends a [`SimpleLogProcessor`] exporting through `exporter`.
    pub fn add_simple_exporter<T: LogExporter + 'static>(&self, exporter: T) {
        self.add_processor(SimpleLogProcessor::new(exporter));
    }

    /// Appends a [`BatchLogProcessor`] configured from the environment.
    pub fn add_batch_exporter<T: LogExporter + 'static>(&self, exporter: T) {
        self.add_processor(BatchLogProcessor::builder(exporter).build());
    }

    /// The resource attached to every exported record.
    pub fn resource(&self) -> &Resource {
        &self.inner.state.resource
    }

    /// Force flush all remaining logs in log processors and return results.
    pub fn force_flush(&self) -> SdkResult {
        self.inner.state.force_flush()
    }

    /// Shuts down this `LoggerProvider`. Later calls return `Ok(())`.
    pub fn shutdown(&self) -> SdkResult {
        diag_info!(
            name: "LoggerProvider.ShutdownInvokedByUser",
            message = "User initiated shutdown of LoggerProvider."
        );
        self.inner.state.shutdown()
    }
}

#[derive(Debug, Default)]
/// Builder for provider attributes.
pub struct LoggerProviderBuilder {
    processors: Vec<Box<dyn LogProcessor>>,
    resource: Option<Resource>,
}

impl LoggerProviderBuilder {
    /// Adds a [SimpleLogProcessor] with the configured exporter to the pipeline.
    ///
    /// # Arguments
    ///
    /// * `exporter` - The exporter to be used by the SimpleLogProcessor.
    ///
    /// # Returns
    ///
    /// A new `Builder` instance with the SimpleLogProcessor added to the pipeline.
    ///
    /// Processors are invoked in the order they are added.
    pub fn with_simple_exporter<T: LogExporter + 'static>(self, exporter: T) -> Self {
        self.with_log_processor(SimpleLogProcessor::new(exporter))
    }

    /// Adds a [BatchLogProcessor] with the configured exporter to the pipeline.
    ///
    /// The batch settings come from the `OTEL_BLRP_*` environment variables.
    ///
    /// Processors are invoked in the order they are added.
    pub fn with_batch_exporter<T: LogExporter + 'static>(self, exporter: T) -> Self {
        self.with_log_processor(BatchLogProcessor::builder(exporter).build())
    }

    /// Adds a custom [LogProcessor] to the pipeline.
    ///
    /// Processors are invoked in the order they are added, and each one sees
    /// the changes made to the record by the ones before it.
    pub fn with_log_processor<T: LogProcessor + 'static>(mut self, processor: T) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// The `Resource` to be associated with this Provider.
    pub fn with_resource(self, resource: Resource) -> Self {
        LoggerProviderBuilder {
            resource: Some(resource),
            ..self
        }
    }

    /// Create a new provider from this configuration.
    pub fn build(self) -> SdkLoggerProvider {
        let resource = self.resource.unwrap_or_default();
        let mut processors = self.processors;
        for processor in &mut processors {
            processor.set_resource(&resource);
        }

        SdkLoggerProvider {
            inner: Arc::new(LoggerProviderInner {
                state: Arc::new(LoggerProviderState {
                    processors: RwLock::new(processors),
                    resource,
                    is_shutdown: AtomicBool::new(false),
                }),
                loggers: ScopeCache::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use crate::logs::InMemoryLogExporter;
    use crate::resource::SERVICE_NAME;
    use rstest::rstest;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use telemetry::logs::{Logger, LoggerProvider};
    use telemetry::{Key, KeyValue, Value};

    #[derive(Debug)]
    struct ShutdownTestLogProcessor {
        is_shutdown: Arc<Mutex<bool>>,
        counter: Arc<AtomicUsize>,
        fail: bool,
    }

    impl ShutdownTestLogProcessor {
        pub(crate) fn new(counter: Arc<AtomicUsize>) -> Self {
            ShutdownTestLogProcessor {
                is_shutdown: Arc::new(Mutex::new(false)),
                counter,
                fail: false,
            }
        }
    }

    impl LogProcessor for ShutdownTestLogProcessor {
        fn emit(&self, _data: &mut SdkLogRecord, _scope: &InstrumentationScope) {
            self.is_shutdown
                .lock()
                .map(|is_shutdown| {
                    if !*is_shutdown {
                        self.counter
                            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    }
                })
                .expect("lock poisoned");
        }

        fn force_flush(&self) -> SdkResult {
            Ok(())
        }

        fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult {
            *self.is_shutdown.lock().unwrap() = true;
            if self.fail {
                Err(SdkError::InternalFailure("cannot shut down".into()))
            } else {
                Ok(())
            }
        }
    }

    #[rstest]
    #[case(None, None)]
    #[case(Some("my-service"), Some("my-service"))]
    fn test_logger_provider_default_resource(
        #[case] service_name: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        temp_env::with_vars(
            [
                ("OTEL_SERVICE_NAME", service_name),
                ("OTEL_RESOURCE_ATTRIBUTES", Some("key1=value1")),
            ],
            || {
                let provider = SdkLoggerProvider::builder()
                    .with_resource(Resource::builder().build())
                    .build();
                let service = provider
                    .resource()
                    .get(&Key::from(SERVICE_NAME))
                    .map(|v| v.to_string());
                match expected {
                    Some(name) => assert_eq!(service.as_deref(), Some(name)),
                    None => assert!(service.is_some()),
                }
                assert_eq!(
                    provider.resource().get(&Key::from_static_str("key1")),
                    Some(Value::from("value1"))
                );
            },
        );
    }

    #[test]
    fn loggers_are_cached_by_scope() {
        let provider = SdkLoggerProvider::builder().build();
        let a = provider.logger("lib");
        let b = provider.logger_with_scope(InstrumentationScope::builder("lib").build());
        let c = provider.logger_with_scope(
            InstrumentationScope::builder("lib")
                .with_version("2")
                .build(),
        );
        assert!(a.same_handle(&b));
        assert!(!a.same_handle(&c));
        assert_eq!(c.instrumentation_scope().version(), Some("2"));
    }

    #[test]
    fn shutdown_test() {
        let counter = Arc::new(AtomicUsize::new(0));
        let logger_provider = SdkLoggerProvider::builder()
            .with_log_processor(ShutdownTestLogProcessor::new(counter.clone()))
            .build();

        let logger1 = logger_provider.logger("test-logger1");
        let logger2 = logger_provider.logger("test-logger2");
        logger1.emit(logger1.create_log_record());
        logger2.emit(logger1.create_log_record());

        let logger3 = logger_provider.logger("test-logger3");
        let handle = std::thread::spawn(move || {
            logger3.emit(logger3.create_log_record());
        });
        handle.join().expect("thread panicked");

        let _ = logger_provider.shutdown();
        logger1.emit(logger1.create_log_record());

        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 3);
        assert!(logger_provider.shutdown().is_ok());
    }

    #[test]
    fn shutdown_aggregates_processor_failures() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut failing = ShutdownTestLogProcessor::new(counter.clone());
        failing.fail = true;
        let provider = SdkLoggerProvider::builder()
            .with_log_processor(ShutdownTestLogProcessor::new(counter.clone()))
            .with_log_processor(failing)
            .build();

        assert!(provider.force_flush().is_ok());
        assert!(matches!(
            provider.shutdown(),
            Err(SdkError::InternalFailure(_))
        ));
        assert!(provider.shutdown().is_ok());
        assert!(provider.force_flush().is_ok());
    }

    #[test]
    fn drop_test_with_multiple_providers() {
        let exporter = InMemoryLogExporter::default();
        {
            let shared = SdkLoggerProvider::builder()
                .with_simple_exporter(exporter.clone())
                .build();
            let logger1 = shared.clone().logger("logger1");
            let logger2 = shared.clone().logger("logger2");
            logger1.emit(logger1.create_log_record());
            logger2.emit(logger1.create_log_record());
            assert_eq!(exporter.shutdown_calls(), 0);
        }
        // the last clone went away with the scope
        assert_eq!(exporter.shutdown_calls(), 1);
        assert_eq!(exporter.get_emitted_logs().unwrap().len(), 2);
    }

    #[test]
    fn drop_after_shutdown_does_not_shut_down_again() {
        let exporter = InMemoryLogExporter::default();
        let provider = SdkLoggerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        provider.shutdown().unwrap();
        drop(provider);
        assert_eq!(exporter.shutdown_calls(), 1);
    }

    #[test]
    fn late_processor_receives_resource_and_records() {
        let provider = SdkLoggerProvider::builder()
            .with_resource(
                Resource::builder_empty()
                    .with_attribute(KeyValue::new("k", "v"))
                    .build(),
            )
            .build();
        let logger = provider.logger("test");
        logger.emit(logger.create_log_record());

        let exporter = InMemoryLogExporter::default();
        provider.add_simple_exporter(exporter.clone());
        logger.emit(logger.create_log_record());

        let logs = exporter.get_emitted_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(
            logs[0].resource.get(&Key::from_static_str("k")),
            Some(Value::from("v"))
        );

        provider.shutdown().unwrap();
        let ignored = InMemoryLogExporter::default();
        provider.add_simple_exporter(ignored.clone());
        drop(provider);
        assert_eq!(ignored.shutdown_calls(), 0);
    }
}
