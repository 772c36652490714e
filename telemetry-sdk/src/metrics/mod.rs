//! The metrics SDK: instruments, views, aggregation and readers.
//!
//! ## Configuration
//!
//! The metrics SDK configuration is stored with each [SdkMeterProvider].
//! Configuration for [Resource]s, [View]s, and [ManualReader] or
//! [PeriodicReader] instances can be specified, at build time or later.
//!
//! ### Example
//!
//! ```
//! use telemetry::global;
//! use telemetry::KeyValue;
//! use telemetry_sdk::{metrics::SdkMeterProvider, Resource};
//!
//! // Generate SDK configuration, resource, views, etc
//! let resource = Resource::builder().build(); // default attributes about the current process
//!
//! // Create a meter provider with the desired config
//! let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
//! global::set_meter_provider(meter_provider.clone());
//!
//! // Use the meter provider to create meter instances
//! let meter = global::meter("my_app");
//!
//! // Create instruments scoped to the meter
//! let counter = meter
//!     .u64_counter("power_consumption")
//!     .with_unit("kWh")
//!     .build();
//!
//! // use instruments to record measurements
//! counter.add(10, &[KeyValue::new("rate", "standard")]);
//!
//! // shutdown the provider at the end of the application to ensure any metrics not yet
//! // exported are flushed.
//! meter_provider.shutdown().unwrap();
//! ```
//!
//! [Resource]: crate::Resource

pub(crate) mod aggregation;
pub mod data;
mod diagnostics;
mod error;
pub mod exporter;
pub(crate) mod instrument;
pub(crate) mod internal;
pub(crate) mod manual_reader;
pub(crate) mod meter;
mod meter_provider;
pub(crate) mod periodic_reader;
pub(crate) mod pipeline;
pub mod reader;
pub(crate) mod view;

/// In-Memory metric exporter for testing purpose.
#[cfg(any(feature = "testing", test))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "testing", test))))]
pub mod in_memory_exporter;
#[cfg(any(feature = "testing", test))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "testing", test))))]
pub use in_memory_exporter::{InMemoryMetricExporter, InMemoryMetricExporterBuilder};

pub use aggregation::{Aggregation, DEFAULT_HISTOGRAM_BOUNDARIES};
pub use data::Temporality;
pub use diagnostics::MetricDiagnostics;
pub use error::{MetricError, MetricResult};
pub use exporter::PushMetricExporter;
pub use instrument::{Instrument, InstrumentKind, Stream, StreamBuilder};
pub use manual_reader::{ManualReader, ManualReaderBuilder};
pub use meter_provider::{MeterProviderBuilder, SdkMeterProvider};
pub use periodic_reader::{PeriodicReader, PeriodicReaderBuilder};
#[doc(hidden)]
pub use pipeline::Pipeline;
pub use reader::MetricReader;
pub use view::{new_view, View};
