use crate::metrics::{Counter, Gauge, Histogram, InstrumentProvider, UpDownCounter};
use crate::KeyValue;
use core::fmt;
use std::borrow::Cow;
use std::marker;

use super::{ObservableCounter, ObservableGauge, ObservableUpDownCounter};

pub(super) mod counter;
pub(super) mod gauge;
pub(super) mod histogram;
pub(super) mod up_down_counter;

/// The interface SDKs implement to receive synchronous measurements.
pub trait SyncInstrument<T>: Send + Sync {
    /// Records a measurement with the given attributes.
    fn measure(&self, measurement: T, attributes: &[KeyValue]);
}

/// An SDK implemented instrument that records measurements via callback.
pub trait AsyncInstrument<T>: Send + Sync {
    /// Observes the state of the instrument.
    ///
    /// It is only valid to call this within a callback.
    fn observe(&self, measurement: T, attributes: &[KeyValue]);
}

/// Function called by the SDK on every collection to report the current
/// value of an asynchronous instrument.
pub type Callback<T> = Box<dyn Fn(&dyn AsyncInstrument<T>) + Send + Sync>;

/// Configuration for building a histogram.
#[non_exhaustive]
pub struct HistogramBuilder<'a, T> {
    /// Instrument provider is used to create the instrument.
    pub instrument_provider: &'a dyn InstrumentProvider,

    /// Name of the histogram.
    pub name: Cow<'static, str>,

    /// Description of the histogram.
    pub description: Option<Cow<'static, str>>,

    /// Unit of the histogram.
    pub unit: Option<Cow<'static, str>>,

    /// Bucket boundaries for the histogram.
    pub boundaries: Option<Vec<f64>>,

    _marker: marker::PhantomData<T>,
}

impl<'a, T> HistogramBuilder<'a, T> {
    pub(crate) fn new(instrument_provider: &'a dyn InstrumentProvider, name: Cow<'static, str>) -> Self {
        HistogramBuilder {
            instrument_provider,
            name,
            description: None,
            unit: None,
            boundaries: None,
            _marker: marker::PhantomData,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<Cow<'static, str>>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    ///
    /// Unit is case sensitive(`kb` is not the same as `kB`).
    ///
    /// Unit must be:
    /// - ASCII string
    /// - No longer than 63 characters
    pub fn with_unit<S: Into<Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the boundaries for this histogram.
    ///
    /// Boundaries must be finite, strictly increasing and free of duplicates;
    /// otherwise the SDK logs a warning and returns a no-op histogram.
    pub fn with_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.boundaries = Some(boundaries);
        self
    }
}

impl HistogramBuilder<'_, Histogram<f64>> {
    /// Creates a new instrument.
    ///
    /// Validates the instrument configuration and creates a new instrument. In
    /// case of invalid configuration, a no-op instrument is returned
    /// and an error is logged using internal logging.
    pub fn build(self) -> Histogram<f64> {
        self.instrument_provider.f64_histogram(self)
    }
}

impl HistogramBuilder<'_, Histogram<u64>> {
    /// Creates a new instrument.
    ///
    /// Validates the instrument configuration and creates a new instrument. In
    /// case of invalid configuration, a no-op instrument is returned
    /// and an error is logged using internal logging.
    pub fn build(self) -> Histogram<u64> {
        self.instrument_provider.u64_histogram(self)
    }
}

impl<T> fmt::Debug for HistogramBuilder<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .field("boundaries", &self.boundaries)
            .field(
                "kind",
                &format!("Histogram<{}>", &std::any::type_name::<T>()),
            )
            .finish()
    }
}

/// Configuration for building a sync instrument.
#[non_exhaustive]
pub struct InstrumentBuilder<'a, T> {
    /// Instrument provider is used to create the instrument.
    pub instrument_provider: &'a dyn InstrumentProvider,

    /// Name of the instrument.
    pub name: Cow<'static, str>,

    /// Description of the instrument.
    pub description: Option<Cow<'static, str>>,

    /// Unit of the instrument.
    pub unit: Option<Cow<'static, str>>,

    _marker: marker::PhantomData<T>,
}

impl<'a, T> InstrumentBuilder<'a, T> {
    pub(crate) fn new(instrument_provider: &'a dyn InstrumentProvider, name: Cow<'static, str>) -> Self {
        InstrumentBuilder {
            instrument_provider,
            name,
            description: None,
            unit: None,
            _marker: marker::PhantomData,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<Cow<'static, str>>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    ///
    /// Unit is case sensitive(`kb` is not the same as `kB`).
    pub fn with_unit<S: Into<Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

macro_rules! build_instrument {
    ($name:ident, $inst:ty) => {
        impl<'a> InstrumentBuilder<'a, $inst> {
            #[doc = concat!("Validates the instrument configuration and creates a new `", stringify!($inst), "`.")]
            /// In case of invalid configuration, a no-op instrument is returned
            /// and an error is logged using internal logging.
            pub fn build(self) -> $inst {
                self.instrument_provider.$name(self)
            }
        }
    };
}

build_instrument!(u64_counter, Counter<u64>);
build_instrument!(f64_counter, Counter<f64>);
build_instrument!(u64_gauge, Gauge<u64>);
build_instrument!(f64_gauge, Gauge<f64>);
build_instrument!(i64_gauge, Gauge<i64>);
build_instrument!(i64_up_down_counter, UpDownCounter<i64>);
build_instrument!(f64_up_down_counter, UpDownCounter<f64>);

impl<T> fmt::Debug for InstrumentBuilder<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .field("kind", &std::any::type_name::<T>())
            .finish()
    }
}

/// Configuration for building an async instrument.
#[non_exhaustive]
pub struct AsyncInstrumentBuilder<'a, I, M> {
    /// Instrument provider is used to create the instrument.
    pub instrument_provider: &'a dyn InstrumentProvider,

    /// Name of the instrument.
    pub name: Cow<'static, str>,

    /// Description of the instrument.
    pub description: Option<Cow<'static, str>>,

    /// Unit of the instrument.
    pub unit: Option<Cow<'static, str>>,

    /// Callbacks to be called for this instrument.
    pub callbacks: Vec<Callback<M>>,

    _inst: marker::PhantomData<I>,
}

impl<'a, I, M> AsyncInstrumentBuilder<'a, I, M> {
    pub(crate) fn new(instrument_provider: &'a dyn InstrumentProvider, name: Cow<'static, str>) -> Self {
        AsyncInstrumentBuilder {
            instrument_provider,
            name,
            description: None,
            unit: None,
            callbacks: Vec::new(),
            _inst: marker::PhantomData,
        }
    }

    /// Set the description for this instrument
    pub fn with_description<S: Into<Cow<'static, str>>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the unit for this instrument.
    pub fn with_unit<S: Into<Cow<'static, str>>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the callback to be called for this instrument.
    ///
    /// Callbacks run on the collecting thread at the start of every
    /// collection and must not block.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&dyn AsyncInstrument<M>) + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
        self
    }
}

macro_rules! build_async_instrument {
    ($name:ident, $inst:ty, $measurement:ty) => {
        impl<'a> AsyncInstrumentBuilder<'a, $inst, $measurement> {
            #[doc = concat!("Validates the instrument configuration and creates a new `", stringify!($inst), "`.")]
            /// In case of invalid configuration, a no-op instrument is returned
            /// and an error is logged using internal logging.
            pub fn build(self) -> $inst {
                self.instrument_provider.$name(self)
            }
        }
    };
}

build_async_instrument!(u64_observable_counter, ObservableCounter<u64>, u64);
build_async_instrument!(f64_observable_counter, ObservableCounter<f64>, f64);
build_async_instrument!(u64_observable_gauge, ObservableGauge<u64>, u64);
build_async_instrument!(f64_observable_gauge, ObservableGauge<f64>, f64);
build_async_instrument!(i64_observable_gauge, ObservableGauge<i64>, i64);
build_async_instrument!(
    i64_observable_up_down_counter,
    ObservableUpDownCounter<i64>,
    i64
);
build_async_instrument!(
    f64_observable_up_down_counter,
    ObservableUpDownCounter<f64>,
    f64
);

impl<I, M> fmt::Debug for AsyncInstrumentBuilder<'_, I, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncInstrumentBuilder")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("unit", &self.unit)
            .field("kind", &std::any::type_name::<I>())
            .field("callbacks_len", &self.callbacks.len())
            .finish()
    }
}
