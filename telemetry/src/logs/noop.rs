use std::borrow::Cow;
use std::time::SystemTime;

use crate::logs::{AnyValue, LogRecord, Logger, LoggerProvider, Severity};
use crate::{InstrumentationScope, Key};

/// A no-op implementation of a [`LoggerProvider`].
#[derive(Clone, Debug, Default)]
pub struct NoopLoggerProvider(());

impl NoopLoggerProvider {
    /// Create a new no-op logger provider.
    pub fn new() -> Self {
        NoopLoggerProvider(())
    }
}

impl LoggerProvider for NoopLoggerProvider {
    type Logger = NoopLogger;

    fn logger_with_scope(&self, _scope: InstrumentationScope) -> Self::Logger {
        NoopLogger(())
    }
}

/// A no-op log record that ignores every field.
#[derive(Debug, Clone, Default)]
pub struct NoopLogRecord;

impl LogRecord for NoopLogRecord {
    fn set_event_name(&mut self, _name: &'static str) {}
    fn set_target<T>(&mut self, _target: T)
    where
        T: Into<Cow<'static, str>>,
    {
    }
    fn set_timestamp(&mut self, _timestamp: SystemTime) {}
    fn set_observed_timestamp(&mut self, _timestamp: SystemTime) {}
    fn set_severity_text(&mut self, _text: &'static str) {}
    fn set_severity_number(&mut self, _number: Severity) {}
    fn set_body(&mut self, _body: AnyValue) {}
    fn add_attribute<K, V>(&mut self, _key: K, _value: V)
    where
        K: Into<Key>,
        V: Into<AnyValue>,
    {
    }
}

/// A no-op implementation of a [`Logger`]
#[derive(Clone, Debug)]
pub struct NoopLogger(());

impl Logger for NoopLogger {
    type LogRecord = NoopLogRecord;

    fn create_log_record(&self) -> Self::LogRecord {
        NoopLogRecord
    }

    fn emit(&self, _record: Self::LogRecord) {}
}
