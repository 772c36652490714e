#![allow(unused_macros)]
//! Diagnostic macros for the SDK's own events.
//!
//! `diag_debug!`, `diag_info!`, `diag_warn!` and `diag_error!` are meant for
//! code inside the SDK and for custom readers, processors and exporters. They
//! are not a general purpose logging facility.
//!
//! With the `internal-logs` feature of the calling crate enabled, events are
//! forwarded to [`tracing`](https://docs.rs/tracing) with the calling crate's
//! package name as target. Test builds print them to stdout instead, and
//! everything else compiles them away.
//!
//! Every event carries a `name` in `Component.Event` form, optionally followed
//! by `key = value` fields:
//!
//! ```rust
//! use telemetry::diag_warn;
//! diag_warn!(name: "PeriodicReader.ExportFailed", exporter = 2, error = "timed out");
//! ```

/// Emit a debug level diagnostic event.
#[macro_export]
macro_rules! diag_debug {
    (name: $name:expr $(,)?) => {{
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::debug!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name);
        }

        #[cfg(test)]
        {
            print!("diag_debug: name={}\n", $name);
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = $name;
        }
    }};
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::debug!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+);
        }

        #[cfg(test)]
        {
            print!("diag_debug: name={}", $name);
            $(
                print!(", {}={}", stringify!($key), $value);
            )+
            print!("\n");
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = ($name, $($value),+);
        }
    }};
}

/// Emit an info level diagnostic event.
#[macro_export]
macro_rules! diag_info {
    (name: $name:expr $(,)?) => {{
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::info!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name);
        }

        #[cfg(test)]
        {
            print!("diag_info: name={}\n", $name);
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = $name;
        }
    }};
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::info!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+);
        }

        #[cfg(test)]
        {
            print!("diag_info: name={}", $name);
            $(
                print!(", {}={}", stringify!($key), $value);
            )+
            print!("\n");
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = ($name, $($value),+);
        }
    }};
}

/// Emit a warning level diagnostic event. Configuration problems that the
/// SDK recovers from with a fallback are reported at this level.
#[macro_export]
macro_rules! diag_warn {
    (name: $name:expr $(,)?) => {{
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::warn!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name);
        }

        #[cfg(test)]
        {
            print!("diag_warn: name={}\n", $name);
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = $name;
        }
    }};
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::warn!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+);
        }

        #[cfg(test)]
        {
            print!("diag_warn: name={}", $name);
            $(
                print!(", {}={}", stringify!($key), $value);
            )+
            print!("\n");
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = ($name, $($value),+);
        }
    }};
}

/// Emit an error level diagnostic event.
#[macro_export]
macro_rules! diag_error {
    (name: $name:expr $(,)?) => {{
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::error!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name);
        }

        #[cfg(test)]
        {
            print!("diag_error: name={}\n", $name);
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = $name;
        }
    }};
    (name: $name:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        #[cfg(feature = "internal-logs")]
        {
            $crate::_private::error!(name: $name, target: env!("CARGO_PKG_NAME"), name = $name, $($key = $value),+);
        }

        #[cfg(test)]
        {
            print!("diag_error: name={}", $name);
            $(
                print!(", {}={}", stringify!($key), $value);
            )+
            print!("\n");
        }

        #[cfg(all(not(feature = "internal-logs"), not(test)))]
        {
            let _ = ($name, $($value),+);
        }
    }};
}
