use std::{
    borrow::Cow,
    fmt,
    sync::{Arc, OnceLock, RwLock},
    time::SystemTime,
};

use crate::logs::{AnyValue, LogRecord, Logger, LoggerProvider, NoopLoggerProvider, Severity};
#[cfg(feature = "trace")]
use crate::trace::{SpanId, TraceId};
use crate::{diag_error, diag_info, InstrumentationScope, Key};

/// A log record that buffers every field so it can cross an object-safe
/// boundary; it is replayed into the real logger's record on emit.
#[derive(Debug, Clone, Default)]
pub struct BoxedLogRecord {
    event_name: Option<&'static str>,
    target: Option<Cow<'static, str>>,
    timestamp: Option<SystemTime>,
    observed_timestamp: Option<SystemTime>,
    severity_text: Option<&'static str>,
    severity_number: Option<Severity>,
    body: Option<AnyValue>,
    attributes: Vec<(Key, AnyValue)>,
    #[cfg(feature = "trace")]
    trace_context: Option<(TraceId, SpanId)>,
}

impl BoxedLogRecord {
    fn replay_into<R: LogRecord>(self, record: &mut R) {
        if let Some(name) = self.event_name {
            record.set_event_name(name);
        }
        if let Some(target) = self.target {
            record.set_target(target);
        }
        if let Some(timestamp) = self.timestamp {
            record.set_timestamp(timestamp);
        }
        if let Some(observed) = self.observed_timestamp {
            record.set_observed_timestamp(observed);
        }
        if let Some(text) = self.severity_text {
            record.set_severity_text(text);
        }
        if let Some(number) = self.severity_number {
            record.set_severity_number(number);
        }
        if let Some(body) = self.body {
            record.set_body(body);
        }
        record.add_attributes(self.attributes);
        #[cfg(feature = "trace")]
        if let Some((trace_id, span_id)) = self.trace_context {
            record.set_trace_context(trace_id, span_id);
        }
    }
}

impl LogRecord for BoxedLogRecord {
    fn set_event_name(&mut self, name: &'static str) {
        self.event_name = Some(name);
    }

    fn set_target<T>(&mut self, target: T)
    where
        T: Into<Cow<'static, str>>,
    {
        self.target = Some(target.into());
    }

    fn set_timestamp(&mut self, timestamp: SystemTime) {
        self.timestamp = Some(timestamp);
    }

    fn set_observed_timestamp(&mut self, timestamp: SystemTime) {
        self.observed_timestamp = Some(timestamp);
    }

    fn set_severity_text(&mut self, text: &'static str) {
        self.severity_text = Some(text);
    }

    fn set_severity_number(&mut self, number: Severity) {
        self.severity_number = Some(number);
    }

    fn set_body(&mut self, body: AnyValue) {
        self.body = Some(body);
    }

    fn add_attribute<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Key>,
        V: Into<AnyValue>,
    {
        self.attributes.push((key.into(), value.into()));
    }

    #[cfg(feature = "trace")]
    fn set_trace_context(&mut self, trace_id: TraceId, span_id: SpanId) {
        self.trace_context = Some((trace_id, span_id));
    }
}

/// Object safe counterpart of [`Logger`].
pub trait ObjectSafeLogger {
    /// Emits a buffered record through the underlying logger.
    fn emit_boxed(&self, record: BoxedLogRecord);
}

impl<L: Logger> ObjectSafeLogger for L {
    fn emit_boxed(&self, record: BoxedLogRecord) {
        let mut inner = self.create_log_record();
        record.replay_into(&mut inner);
        self.emit(inner);
    }
}

/// Wraps the global provider's logger so it can be used without knowing the
/// underlying type.
pub struct BoxedLogger(Box<dyn ObjectSafeLogger + Send + Sync>);

impl fmt::Debug for BoxedLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxedLogger")
    }
}

impl Logger for BoxedLogger {
    type LogRecord = BoxedLogRecord;

    fn create_log_record(&self) -> Self::LogRecord {
        BoxedLogRecord::default()
    }

    fn emit(&self, record: Self::LogRecord) {
        self.0.emit_boxed(record)
    }
}

/// Object safe counterpart of [`LoggerProvider`].
pub trait ObjectSafeLoggerProvider {
    /// Returns a boxed logger for the given scope.
    fn boxed_logger(&self, scope: InstrumentationScope) -> Box<dyn ObjectSafeLogger + Send + Sync>;
}

impl<L, P> ObjectSafeLoggerProvider for P
where
    L: Logger + Send + Sync + 'static,
    P: LoggerProvider<Logger = L>,
{
    fn boxed_logger(&self, scope: InstrumentationScope) -> Box<dyn ObjectSafeLogger + Send + Sync> {
        Box::new(self.logger_with_scope(scope))
    }
}

/// Represents the globally configured [`LoggerProvider`] instance.
#[derive(Clone)]
pub struct GlobalLoggerProvider {
    provider: Arc<dyn ObjectSafeLoggerProvider + Send + Sync>,
}

impl fmt::Debug for GlobalLoggerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GlobalLoggerProvider")
    }
}

impl GlobalLoggerProvider {
    fn new<P>(provider: P) -> Self
    where
        P: ObjectSafeLoggerProvider + Send + Sync + 'static,
    {
        GlobalLoggerProvider {
            provider: Arc::new(provider),
        }
    }
}

impl LoggerProvider for GlobalLoggerProvider {
    type Logger = BoxedLogger;

    fn logger_with_scope(&self, scope: InstrumentationScope) -> Self::Logger {
        BoxedLogger(self.provider.boxed_logger(scope))
    }
}

static GLOBAL_LOGGER_PROVIDER: OnceLock<RwLock<GlobalLoggerProvider>> = OnceLock::new();

#[inline]
fn global_logger_provider() -> &'static RwLock<GlobalLoggerProvider> {
    GLOBAL_LOGGER_PROVIDER
        .get_or_init(|| RwLock::new(GlobalLoggerProvider::new(NoopLoggerProvider::new())))
}

/// Returns an instance of the currently configured global [`LoggerProvider`]
/// through [`GlobalLoggerProvider`].
pub fn logger_provider() -> GlobalLoggerProvider {
    match global_logger_provider().read() {
        Ok(provider) => provider.clone(),
        Err(_) => {
            diag_error!(name: "LoggerProvider.GlobalGetFailed");
            GlobalLoggerProvider::new(NoopLoggerProvider::new())
        }
    }
}

/// Creates a named instance of [`Logger`] via the configured
/// [`GlobalLoggerProvider`].
pub fn logger(name: impl Into<Cow<'static, str>>) -> BoxedLogger {
    logger_provider().logger(name)
}

/// Sets the given [`LoggerProvider`] instance as the current global provider.
///
/// The previous provider is not shut down; the caller owns its lifecycle.
pub fn set_logger_provider<L, P>(new_provider: P)
where
    L: Logger + Send + Sync + 'static,
    P: LoggerProvider<Logger = L> + Send + Sync + 'static,
{
    match global_logger_provider().write() {
        Ok(mut provider) => {
            *provider = GlobalLoggerProvider::new(new_provider);
            diag_info!(name: "LoggerProvider.GlobalSet");
        }
        Err(_) => {
            diag_error!(name: "LoggerProvider.GlobalSetFailed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct CapturedRecord {
        severity: Option<Severity>,
        body: Option<AnyValue>,
        attributes: Vec<(Key, AnyValue)>,
    }

    impl LogRecord for CapturedRecord {
        fn set_event_name(&mut self, _name: &'static str) {}
        fn set_target<T>(&mut self, _target: T)
        where
            T: Into<Cow<'static, str>>,
        {
        }
        fn set_timestamp(&mut self, _timestamp: SystemTime) {}
        fn set_observed_timestamp(&mut self, _timestamp: SystemTime) {}
        fn set_severity_text(&mut self, _text: &'static str) {}
        fn set_severity_number(&mut self, number: Severity) {
            self.severity = Some(number);
        }
        fn set_body(&mut self, body: AnyValue) {
            self.body = Some(body);
        }
        fn add_attribute<K, V>(&mut self, key: K, value: V)
        where
            K: Into<Key>,
            V: Into<AnyValue>,
        {
            self.attributes.push((key.into(), value.into()));
        }
    }

    #[derive(Clone, Default)]
    struct CapturingLogger(Arc<Mutex<Vec<CapturedRecord>>>);

    impl Logger for CapturingLogger {
        type LogRecord = CapturedRecord;

        fn create_log_record(&self) -> Self::LogRecord {
            CapturedRecord::default()
        }

        fn emit(&self, record: Self::LogRecord) {
            self.0.lock().unwrap().push(record);
        }
    }

    #[test]
    fn boxed_logger_replays_every_field() {
        let inner = CapturingLogger::default();
        let boxed = BoxedLogger(Box::new(inner.clone()));

        let mut record = boxed.create_log_record();
        record.set_severity_number(Severity::Warn);
        record.set_body("disk almost full".into());
        record.add_attribute("disk", "/dev/sda1");
        boxed.emit(record);

        let captured = inner.0.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].severity, Some(Severity::Warn));
        assert_eq!(captured[0].body, Some(AnyValue::from("disk almost full")));
        assert_eq!(captured[0].attributes.len(), 1);
    }
}
