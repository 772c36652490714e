use crate::KeyValue;
use core::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::SyncInstrument;

/// An instrument that records independent values; the last one recorded in a
/// collection interval wins.
#[derive(Clone)]
#[non_exhaustive]
pub struct Gauge<T>(Arc<dyn SyncInstrument<T> + Send + Sync>);

impl<T> fmt::Debug for Gauge<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("Gauge<{}>", std::any::type_name::<T>()))
    }
}

impl<T> Gauge<T> {
    /// Create a new gauge.
    pub fn new(inner: Arc<dyn SyncInstrument<T> + Send + Sync>) -> Self {
        Gauge(inner)
    }

    /// Records the current value of the gauge.
    pub fn record(&self, value: T, attributes: &[KeyValue]) {
        self.0.measure(value, attributes)
    }
}

/// An async instrument that reports independent values.
#[derive(Clone)]
#[non_exhaustive]
pub struct ObservableGauge<T> {
    _marker: PhantomData<T>,
}

impl<T> fmt::Debug for ObservableGauge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!(
            "ObservableGauge<{}>",
            std::any::type_name::<T>()
        ))
    }
}

impl<T> ObservableGauge<T> {
    /// Create a new observable gauge.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        ObservableGauge {
            _marker: PhantomData,
        }
    }
}
