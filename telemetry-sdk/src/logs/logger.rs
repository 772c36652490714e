use super::logger_provider::LoggerProviderState;
use super::SdkLogRecord;
use std::fmt;
use std::sync::Arc;
use telemetry::time::now;
use telemetry::InstrumentationScope;

/// The object for emitting [`LogRecord`]s.
///
/// [`LogRecord`]: telemetry::logs::LogRecord
#[derive(Clone)]
pub struct SdkLogger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    scope: InstrumentationScope,
    state: Arc<LoggerProviderState>,
}

impl fmt::Debug for SdkLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SdkLogger")
            .field("scope", &self.inner.scope)
            .finish()
    }
}

impl SdkLogger {
    pub(crate) fn new(scope: InstrumentationScope, state: Arc<LoggerProviderState>) -> Self {
        SdkLogger {
            inner: Arc::new(LoggerInner { scope, state }),
        }
    }

    /// Instrumentation scope of this logger.
    pub fn instrumentation_scope(&self) -> &InstrumentationScope {
        &self.inner.scope
    }

    #[cfg(test)]
    pub(crate) fn same_handle(&self, other: &SdkLogger) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl telemetry::logs::Logger for SdkLogger {
    type LogRecord = SdkLogRecord;

    fn create_log_record(&self) -> Self::LogRecord {
        SdkLogRecord::default()
    }

    /// Emit a `LogRecord`.
    ///
    /// Records emitted after the provider shut down are discarded.
    fn emit(&self, mut record: Self::LogRecord) {
        if record.observed_timestamp.is_none() {
            record.observed_timestamp = Some(now());
        }
        self.inner.state.emit(&mut record, &self.inner.scope);
    }
}
