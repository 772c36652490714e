//! Utilities for working with global telemetry primitives
//!
//! Applications register one provider per signal at startup; libraries then
//! obtain meters, tracers and loggers through the functions in this module
//! without knowing the concrete SDK type. Until a provider is registered,
//! no-op providers are handed out.
//!
//! ```
//! use telemetry::{global, KeyValue};
//!
//! fn do_something_instrumented() {
//!     let meter = global::meter("my-component");
//!     let counter = meter.u64_counter("my_counter").build();
//!     counter.add(1, &[KeyValue::new("mykey", "myvalue")]);
//! }
//! # do_something_instrumented();
//! ```

pub mod internal_logging;
#[cfg(feature = "logs")]
mod logs;
#[cfg(feature = "metrics")]
mod metrics;
#[cfg(feature = "trace")]
mod trace;

#[cfg(feature = "logs")]
pub use logs::*;
#[cfg(feature = "metrics")]
pub use metrics::*;
#[cfg(feature = "trace")]
pub use trace::*;
