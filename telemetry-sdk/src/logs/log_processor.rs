use crate::error::SdkResult;
use crate::{logs::SdkLogRecord, Resource};
use std::fmt::Debug;
use std::time::Duration;
use telemetry::InstrumentationScope;

/// A stage between [`SdkLogger`] and an exporter.
///
/// The provider calls every registered processor, in registration order, for
/// each emitted record. [`SimpleLogProcessor`] exports on the emitting thread,
/// [`BatchLogProcessor`] queues records for a worker thread.
///
/// [`SdkLogger`]: crate::logs::SdkLogger
/// [`SimpleLogProcessor`]: crate::logs::SimpleLogProcessor
/// [`BatchLogProcessor`]: crate::logs::BatchLogProcessor
pub trait LogProcessor: Send + Sync + Debug {
    /// Handles one emitted record. Edits to `data` are seen by the processors
    /// registered after this one; a processor that keeps the record past this
    /// call clones it.
    fn emit(&self, data: &mut SdkLogRecord, instrumentation: &InstrumentationScope);

    /// Exports whatever this processor still holds.
    fn force_flush(&self) -> SdkResult;

    /// Exports what is left, shuts the exporter down and stops accepting
    /// records. Repeated calls return `Ok(())`.
    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult;

    /// [`shutdown_with_timeout`](LogProcessor::shutdown_with_timeout) with five seconds.
    fn shutdown(&self) -> SdkResult {
        self.shutdown_with_timeout(Duration::from_secs(5))
    }

    /// Receives the provider's resource, once at registration.
    fn set_resource(&mut self, _resource: &Resource) {}
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::error::SdkResult;
    use crate::logs::{LogBatch, LogExporter, LogProcessor, SdkLogRecord, SdkLoggerProvider};
    use crate::Resource;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use telemetry::logs::{AnyValue, LogRecord as _, Logger, LoggerProvider};
    use telemetry::{InstrumentationScope, Key};

    #[derive(Debug, Clone)]
    pub(crate) struct MockLogExporter {
        pub(crate) resource: Arc<Mutex<Option<Resource>>>,
    }

    impl LogExporter for MockLogExporter {
        async fn export(&self, _batch: LogBatch<'_>) -> SdkResult {
            Ok(())
        }

        fn set_resource(&mut self, resource: &Resource) {
            self.resource
                .lock()
                .map(|mut res_opt| {
                    res_opt.replace(resource.clone());
                })
                .expect("mock log exporter shouldn't error when setting resource");
        }
    }

    // Implementation specific to the MockLogExporter, not part of the LogExporter trait
    impl MockLogExporter {
        pub(crate) fn get_resource(&self) -> Option<Resource> {
            (*self.resource).lock().unwrap().clone()
        }
    }

    #[derive(Debug)]
    struct FirstProcessor {
        pub(crate) logs: Arc<Mutex<Vec<(SdkLogRecord, InstrumentationScope)>>>,
    }

    impl LogProcessor for FirstProcessor {
        fn emit(&self, record: &mut SdkLogRecord, instrumentation: &InstrumentationScope) {
            // add attribute
            record.add_attribute(
                Key::from_static_str("processed_by"),
                AnyValue::String("FirstProcessor".into()),
            );
            // update body
            record.body = Some("Updated by FirstProcessor".into());

            self.logs
                .lock()
                .unwrap()
                .push((record.clone(), instrumentation.clone())); //clone as the LogProcessor is storing the data.
        }

        fn force_flush(&self) -> SdkResult {
            Ok(())
        }

        fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct SecondProcessor {
        pub(crate) logs: Arc<Mutex<Vec<(SdkLogRecord, InstrumentationScope)>>>,
    }

    impl LogProcessor for SecondProcessor {
        fn emit(&self, record: &mut SdkLogRecord, instrumentation: &InstrumentationScope) {
            assert!(record.attributes_contains(
                &Key::from_static_str("processed_by"),
                &AnyValue::String("FirstProcessor".into())
            ));
            assert!(
                record.body.clone().unwrap()
                    == AnyValue::String("Updated by FirstProcessor".into())
            );
            self.logs
                .lock()
                .unwrap()
                .push((record.clone(), instrumentation.clone()));
        }

        fn force_flush(&self) -> SdkResult {
            Ok(())
        }

        fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult {
            Ok(())
        }
    }

    #[test]
    fn test_log_data_modification_by_multiple_processors() {
        let first_processor_logs = Arc::new(Mutex::new(Vec::new()));
        let second_processor_logs = Arc::new(Mutex::new(Vec::new()));

        let first_processor = FirstProcessor {
            logs: Arc::clone(&first_processor_logs),
        };
        let second_processor = SecondProcessor {
            logs: Arc::clone(&second_processor_logs),
        };

        let logger_provider = SdkLoggerProvider::builder()
            .with_log_processor(first_processor)
            .with_log_processor(second_processor)
            .build();

        let logger = logger_provider.logger("test-logger");
        let mut log_record = logger.create_log_record();
        log_record.body = Some(AnyValue::String("Test log".into()));

        logger.emit(log_record);

        assert_eq!(first_processor_logs.lock().unwrap().len(), 1);
        assert_eq!(second_processor_logs.lock().unwrap().len(), 1);

        let first_log = &first_processor_logs.lock().unwrap()[0];
        let second_log = &second_processor_logs.lock().unwrap()[0];

        assert!(first_log.0.attributes_contains(
            &Key::from_static_str("processed_by"),
            &AnyValue::String("FirstProcessor".into())
        ));
        assert!(second_log.0.attributes_contains(
            &Key::from_static_str("processed_by"),
            &AnyValue::String("FirstProcessor".into())
        ));

        assert!(
            first_log.0.body.clone().unwrap()
                == AnyValue::String("Updated by FirstProcessor".into())
        );
        assert!(
            second_log.0.body.clone().unwrap()
                == AnyValue::String("Updated by FirstProcessor".into())
        );
    }
}
