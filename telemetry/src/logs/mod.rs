//! # Logs bridge API
//!
//! This API is meant for authors of log appenders that forward an existing
//! logging library's events into the SDK, not for application code.
mod logger;
mod noop;
mod record;

pub use logger::{Logger, LoggerProvider};
pub use noop::{NoopLogRecord, NoopLogger, NoopLoggerProvider};
pub use record::{AnyValue, LogRecord, Severity};
