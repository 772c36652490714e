use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for input the SDK had to coerce or drop on the recording path.
///
/// Recording never reports errors to the caller; these counters are the only
/// trace of malformed measurements. They are shared by every meter of a
/// [`SdkMeterProvider`](crate::metrics::SdkMeterProvider) and only ever grow.
#[derive(Debug, Default)]
pub struct MetricDiagnostics {
    dropped_attributes: AtomicU64,
    duplicate_attribute_keys: AtomicU64,
    dropped_measurements: AtomicU64,
    overflowed_measurements: AtomicU64,
}

impl MetricDiagnostics {
    /// Attributes removed because their key was empty or their value was NaN.
    pub fn dropped_attributes(&self) -> u64 {
        self.dropped_attributes.load(Ordering::Relaxed)
    }

    /// Attributes discarded because a later attribute used the same key.
    pub fn duplicate_attribute_keys(&self) -> u64 {
        self.duplicate_attribute_keys.load(Ordering::Relaxed)
    }

    /// Measurements discarded for being non-finite, or negative on a
    /// monotonic instrument.
    pub fn dropped_measurements(&self) -> u64 {
        self.dropped_measurements.load(Ordering::Relaxed)
    }

    /// Measurements folded into the overflow series because a stream reached
    /// its cardinality limit.
    pub fn overflowed_measurements(&self) -> u64 {
        self.overflowed_measurements.load(Ordering::Relaxed)
    }

    pub(crate) fn add_dropped_attributes(&self, count: u64) {
        self.dropped_attributes.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn add_duplicate_attribute_keys(&self, count: u64) {
        self.duplicate_attribute_keys
            .fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn add_dropped_measurement(&self) {
        self.dropped_measurements.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_overflowed_measurement(&self) {
        self.overflowed_measurements.fetch_add(1, Ordering::Relaxed);
    }
}
