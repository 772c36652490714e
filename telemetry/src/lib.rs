//! Instrumentation API for metrics, traces and logs.
//!
//! This crate holds the types that instrumented code depends on: attribute
//! [`Key`]s and [`Value`]s, [`InstrumentationScope`], metric instruments,
//! tracer and logger traits, and the [`global`] provider registry. It does
//! nothing on its own; every provider handed out before an SDK is installed
//! is a no-op.
//!
//! ## Getting Started
//!
//! ```
//! # #[cfg(feature = "metrics")]
//! # {
//! use telemetry::{global, KeyValue};
//!
//! // obtain a meter from the globally registered provider
//! let meter = global::meter("my_service");
//!
//! let counter = meter
//!     .u64_counter("requests")
//!     .with_description("Handled requests")
//!     .with_unit("{request}")
//!     .build();
//!
//! counter.add(1, &[KeyValue::new("route", "/health")]);
//! # }
//! ```
//!
//! ## Crate Feature Flags
//!
//! * `trace`: tracer and span traits (enabled by default).
//! * `metrics`: meter and instrument types (enabled by default).
//! * `logs`: logs bridge API (enabled by default).
//! * `internal-logs`: forwards the `diag_*!` diagnostic macros to `tracing`.
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

pub mod global;

mod common;

pub use common::{
    Array, InstrumentationScope, InstrumentationScopeBuilder, Key, KeyValue, StringValue, Value,
};

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub mod metrics;

#[cfg(feature = "trace")]
#[cfg_attr(docsrs, doc(cfg(feature = "trace")))]
pub mod trace;

#[cfg(feature = "logs")]
#[cfg_attr(docsrs, doc(cfg(feature = "logs")))]
pub mod logs;

#[doc(hidden)]
pub mod _private {
    #[cfg(feature = "internal-logs")]
    pub use tracing::{debug, error, info, warn};
}

#[doc(hidden)]
pub mod time {
    use std::time::SystemTime;

    #[doc(hidden)]
    pub fn now() -> SystemTime {
        SystemTime::now()
    }
}
