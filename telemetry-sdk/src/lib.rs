//! # Telemetry SDK
//!
//! This SDK implements the `telemetry` API. Instruments, tracers and loggers
//! obtained from its providers record into in-process state, and readers and
//! processors hand what was recorded to pluggable exporters.
//!
//! ## Getting Started
//!
//! ```
//! # #[cfg(feature = "metrics")]
//! # {
//! use telemetry::{global, KeyValue};
//! use telemetry_sdk::metrics::{ManualReader, SdkMeterProvider};
//!
//! let reader = ManualReader::builder().build();
//! let provider = SdkMeterProvider::builder().with_reader(reader).build();
//! global::set_meter_provider(provider.clone());
//!
//! let counter = global::meter("my_service").u64_counter("requests").build();
//! counter.add(1, &[KeyValue::new("route", "/health")]);
//!
//! provider.shutdown().unwrap();
//! # }
//! ```
//!
//! ## Metrics
//!
//! [`metrics::SdkMeterProvider`] creates meters whose instruments aggregate
//! measurements per attribute set. A [`metrics::ManualReader`] collects on
//! demand, a [`metrics::PeriodicReader`] collects on a timer and pushes to a
//! [`metrics::PushMetricExporter`]. Views rename, filter or re-aggregate
//! streams.
//!
//! ## Traces and Logs
//!
//! [`trace::SdkTracerProvider`] and [`logs::SdkLoggerProvider`] hand finished
//! spans and emitted records to their processors. The batch processors export
//! from a dedicated thread, the simple ones export inline.
//!
//! ## Crate Feature Flags
//!
//! * `trace`: tracer provider, span processors and exporters.
//! * `metrics`: meter provider, aggregation, readers and views.
//! * `logs`: logger provider, log processors and exporters.
//! * `testing`: in-memory exporters for every signal.
//! * `internal-logs`: emits the SDK's own diagnostics through `tracing`.
//!
//! The first four are enabled by default along with `internal-logs`.
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![allow(clippy::needless_doctest_main)]
#![cfg_attr(
    docsrs,
    feature(doc_cfg, doc_auto_cfg),
    deny(rustdoc::broken_intra_doc_links)
)]

#[cfg(any(feature = "trace", feature = "logs"))]
mod batch;
pub mod error;
#[cfg(feature = "logs")]
#[cfg_attr(docsrs, doc(cfg(feature = "logs")))]
pub mod logs;
#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub mod metrics;
pub mod resource;
#[cfg(any(feature = "trace", feature = "metrics", feature = "logs"))]
mod scope_cache;
#[cfg(feature = "trace")]
#[cfg_attr(docsrs, doc(cfg(feature = "trace")))]
pub mod trace;

pub use resource::Resource;
