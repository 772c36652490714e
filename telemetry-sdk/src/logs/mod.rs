//! # Log SDK
//!
//! [`SdkLoggerProvider`] hands out [`SdkLogger`]s. Every record a logger emits
//! passes through the provider's [`LogProcessor`]s in registration order, and
//! the built-in [`SimpleLogProcessor`] and [`BatchLogProcessor`] forward it to
//! a [`LogExporter`].
mod batch_log_processor;
mod export;
pub(crate) mod log_processor;
mod logger;
mod logger_provider;
pub(crate) mod record;
mod simple_log_processor;

/// In-Memory log exporter for testing purpose.
#[cfg(any(feature = "testing", test))]
pub mod in_memory_exporter;
#[cfg(any(feature = "testing", test))]
pub use in_memory_exporter::{InMemoryLogExporter, InMemoryLogExporterBuilder};

pub use batch_log_processor::{
    BatchConfig, BatchConfigBuilder, BatchLogProcessor, BatchLogProcessorBuilder,
};
pub use export::{LogBatch, LogExporter};
pub use log_processor::LogProcessor;
pub use logger::SdkLogger;
pub use logger_provider::{LoggerProviderBuilder, SdkLoggerProvider};
pub use record::SdkLogRecord;
#[cfg(feature = "trace")]
pub use record::TraceContext;
pub use simple_log_processor::SimpleLogProcessor;
