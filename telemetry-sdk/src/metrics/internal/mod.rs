mod aggregate;
mod histogram;
mod last_value;
mod precomputed_sum;
mod sum;

use core::fmt;
use std::collections::{HashMap, HashSet};
use std::mem::take;
use std::ops::{Add, AddAssign, DerefMut, Sub};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use telemetry::{diag_warn, KeyValue};

use super::data::{AggregatedMetrics, MetricData};
use super::diagnostics::MetricDiagnostics;

pub(crate) use aggregate::{
    AggregateBuilder, AggregateFns, AttributeSetFilter, ComputeAggregation, Measure,
};

/// Key of the series that absorbs measurements once a stream is at its
/// cardinality limit.
pub(crate) const OVERFLOW_ATTRIBUTE_KEY: &str = "otel.metric.overflow";

/// Default number of distinct attribute sets a stream tracks.
pub(crate) const DEFAULT_CARDINALITY_LIMIT: usize = 2000;

fn overflow_attributes() -> &'static [KeyValue] {
    static OVERFLOW: OnceLock<Vec<KeyValue>> = OnceLock::new();
    OVERFLOW.get_or_init(|| vec![KeyValue::new(OVERFLOW_ATTRIBUTE_KEY, true)])
}

/// Per attribute set state of an aggregation.
pub(crate) trait Aggregator: Send + Sync + 'static {
    /// Configuration shared by every tracker of a stream.
    type InitConfig: Send + Sync + 'static;

    /// The value passed to [`Aggregator::update`].
    type PreComputedValue;

    fn create(init: &Self::InitConfig) -> Self;

    fn update(&self, value: Self::PreComputedValue);

    /// Returns the current state and leaves the tracker freshly created.
    fn clone_and_reset(&self, init: &Self::InitConfig) -> Self;
}

/// The storage for sums, last values and histograms.
///
/// Both the order an attribute set was supplied in and its sorted order map
/// to the same tracker, so the common path of re-recording a known set is a
/// single read-locked lookup. Delta collection swaps the whole map out under
/// the write lock; recording holds the read lock for the duration of an
/// update, so each update lands in exactly one collection.
pub(crate) struct ValueMap<A: Aggregator> {
    trackers: RwLock<HashMap<Vec<KeyValue>, Arc<A>>>,
    /// Number of distinct attribute sets currently tracked.
    count: AtomicUsize,
    has_no_attribute_value: AtomicBool,
    no_attribute_tracker: A,
    config: A::InitConfig,
    cardinality_limit: usize,
    diagnostics: Arc<MetricDiagnostics>,
}

impl<A: Aggregator> ValueMap<A> {
    pub(crate) fn new(
        config: A::InitConfig,
        cardinality_limit: usize,
        diagnostics: Arc<MetricDiagnostics>,
    ) -> Self {
        ValueMap {
            trackers: RwLock::new(HashMap::new()),
            count: AtomicUsize::new(0),
            has_no_attribute_value: AtomicBool::new(false),
            no_attribute_tracker: A::create(&config),
            config,
            cardinality_limit,
            diagnostics,
        }
    }

    fn is_under_cardinality_limit(&self) -> bool {
        self.count.load(Ordering::SeqCst) < self.cardinality_limit
    }

    pub(crate) fn measure(&self, value: A::PreComputedValue, attributes: &[KeyValue]) {
        if attributes.is_empty() {
            self.no_attribute_tracker.update(value);
            self.has_no_attribute_value.store(true, Ordering::Release);
            return;
        }

        let Ok(trackers) = self.trackers.read() else {
            return;
        };

        // Try to retrieve and update the tracker with the attributes in the provided order first
        if let Some(tracker) = trackers.get(attributes) {
            tracker.update(value);
            return;
        }

        // Try to retrieve and update the tracker with the attributes sorted.
        let sorted_attrs = sorted(attributes);
        if let Some(tracker) = trackers.get(sorted_attrs.as_slice()) {
            tracker.update(value);
            return;
        }

        // Give up the read lock before acquiring the write lock.
        drop(trackers);

        let Ok(mut trackers) = self.trackers.write() else {
            return;
        };

        // Recheck both the provided and sorted orders after acquiring the write lock
        // in case another thread has pushed an update in the meantime.
        if let Some(tracker) = trackers.get(attributes) {
            tracker.update(value);
        } else if let Some(tracker) = trackers.get(sorted_attrs.as_slice()) {
            tracker.update(value);
        } else if self.is_under_cardinality_limit() {
            let new_tracker = Arc::new(A::create(&self.config));
            new_tracker.update(value);

            // Insert tracker with the attributes in the provided and sorted orders
            trackers.insert(attributes.to_vec(), new_tracker.clone());
            trackers.insert(sorted_attrs, new_tracker);

            self.count.fetch_add(1, Ordering::SeqCst);
        } else if let Some(overflow_value) = trackers.get(overflow_attributes()) {
            overflow_value.update(value);
            self.diagnostics.add_overflowed_measurement();
        } else {
            let new_tracker = A::create(&self.config);
            new_tracker.update(value);
            trackers.insert(overflow_attributes().to_vec(), Arc::new(new_tracker));
            self.diagnostics.add_overflowed_measurement();
            diag_warn!(
                name: "ValueMap.CardinalityLimitReached",
                limit = self.cardinality_limit,
                message = "Measurements for new attribute sets are folded into the otel.metric.overflow series until the next delta collection."
            );
        }
    }

    /// Iterates over all attribute sets and maps them to data points without
    /// resetting. Attributes in the output are sorted by key.
    pub(crate) fn collect_readonly<Res, MapFn>(&self, dest: &mut Vec<Res>, mut map_fn: MapFn)
    where
        MapFn: FnMut(Vec<KeyValue>, &A) -> Res,
    {
        prepare_data(dest, self.count.load(Ordering::SeqCst));
        if self.has_no_attribute_value.load(Ordering::Acquire) {
            dest.push(map_fn(vec![], &self.no_attribute_tracker));
        }

        let Ok(trackers) = self.trackers.read() else {
            return;
        };

        let mut seen = HashSet::new();
        for (attrs, tracker) in trackers.iter() {
            if seen.insert(Arc::as_ptr(tracker)) {
                dest.push(map_fn(sorted(attrs), tracker));
            }
        }
    }

    /// Moves every tracker out of the map, so the next interval starts empty,
    /// and maps them to data points.
    pub(crate) fn collect_and_reset<Res, MapFn>(&self, dest: &mut Vec<Res>, mut map_fn: MapFn)
    where
        MapFn: FnMut(Vec<KeyValue>, A) -> Res,
    {
        prepare_data(dest, self.count.load(Ordering::SeqCst));
        if self.has_no_attribute_value.swap(false, Ordering::AcqRel) {
            dest.push(map_fn(
                vec![],
                self.no_attribute_tracker.clone_and_reset(&self.config),
            ));
        }

        let trackers = match self.trackers.write() {
            Ok(mut trackers) => {
                self.count.store(0, Ordering::SeqCst);
                take(trackers.deref_mut())
            }
            Err(_) => return,
        };

        let mut seen = HashSet::new();
        for (attrs, tracker) in trackers.into_iter() {
            if seen.insert(Arc::as_ptr(&tracker)) {
                dest.push(map_fn(sorted(&attrs), tracker.clone_and_reset(&self.config)));
            }
        }
    }
}

fn sorted(attrs: &[KeyValue]) -> Vec<KeyValue> {
    let mut sorted = attrs.to_vec();
    sorted.sort_unstable_by(|a, b| a.key.cmp(&b.key));
    sorted
}

/// Clear and allocate exactly required amount of space for all attribute-sets
fn prepare_data<T>(data: &mut Vec<T>, list_len: usize) {
    data.clear();
    // the no-attribute and overflow series are not part of the count
    let total_len = list_len + 2;
    if total_len > data.capacity() {
        data.reserve_exact(total_len - data.capacity());
    }
}

/// Marks a type that can have a value added and retrieved atomically. Required since
/// different types have different backing atomic mechanisms
pub(crate) trait AtomicTracker<T>: Sync + Send + 'static {
    fn store(&self, _value: T);
    fn add(&self, _value: T);
    fn get_value(&self) -> T;
    fn get_and_reset_value(&self) -> T;
}

/// Marks a type that can have an atomic tracker generated for it
pub(crate) trait AtomicallyUpdate<T> {
    type AtomicTracker: AtomicTracker<T>;
    fn new_atomic_tracker(init: T) -> Self::AtomicTracker;
}

pub(crate) trait Number:
    Add<Output = Self>
    + AddAssign
    + Sub<Output = Self>
    + PartialOrd
    + fmt::Debug
    + Clone
    + Copy
    + PartialEq
    + Default
    + Send
    + Sync
    + 'static
    + AtomicallyUpdate<Self>
{
    fn min() -> Self;
    fn max() -> Self;

    fn into_float(self) -> f64;

    /// `false` for NaN and the infinities.
    fn is_finite(self) -> bool;

    fn is_negative(self) -> bool;

    /// Addition that clamps at the type's bounds instead of overflowing.
    fn add_saturating(self, other: Self) -> Self;

    fn make_aggregated_metrics(data: MetricData<Self>) -> AggregatedMetrics;

    fn extract_metrics_data_mut(data: &mut AggregatedMetrics) -> Option<&mut MetricData<Self>>;
}

impl Number for i64 {
    fn min() -> Self {
        i64::MIN
    }

    fn max() -> Self {
        i64::MAX
    }

    fn into_float(self) -> f64 {
        // May have precision loss at high values
        self as f64
    }

    fn is_finite(self) -> bool {
        true
    }

    fn is_negative(self) -> bool {
        self < 0
    }

    fn add_saturating(self, other: Self) -> Self {
        self.saturating_add(other)
    }

    fn make_aggregated_metrics(data: MetricData<i64>) -> AggregatedMetrics {
        AggregatedMetrics::I64(data)
    }

    fn extract_metrics_data_mut(data: &mut AggregatedMetrics) -> Option<&mut MetricData<i64>> {
        match data {
            AggregatedMetrics::I64(data) => Some(data),
            _ => None,
        }
    }
}

impl Number for u64 {
    fn min() -> Self {
        u64::MIN
    }

    fn max() -> Self {
        u64::MAX
    }

    fn into_float(self) -> f64 {
        // May have precision loss at high values
        self as f64
    }

    fn is_finite(self) -> bool {
        true
    }

    fn is_negative(self) -> bool {
        false
    }

    fn add_saturating(self, other: Self) -> Self {
        self.saturating_add(other)
    }

    fn make_aggregated_metrics(data: MetricData<u64>) -> AggregatedMetrics {
        AggregatedMetrics::U64(data)
    }

    fn extract_metrics_data_mut(data: &mut AggregatedMetrics) -> Option<&mut MetricData<u64>> {
        match data {
            AggregatedMetrics::U64(data) => Some(data),
            _ => None,
        }
    }
}

impl Number for f64 {
    fn min() -> Self {
        f64::MIN
    }

    fn max() -> Self {
        f64::MAX
    }

    fn into_float(self) -> f64 {
        self
    }

    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }

    fn is_negative(self) -> bool {
        self < 0.0
    }

    fn add_saturating(self, other: Self) -> Self {
        self + other
    }

    fn make_aggregated_metrics(data: MetricData<f64>) -> AggregatedMetrics {
        AggregatedMetrics::F64(data)
    }

    fn extract_metrics_data_mut(data: &mut AggregatedMetrics) -> Option<&mut MetricData<f64>> {
        match data {
            AggregatedMetrics::F64(data) => Some(data),
            _ => None,
        }
    }
}

impl AtomicTracker<u64> for AtomicU64 {
    fn store(&self, value: u64) {
        self.store(value, Ordering::Relaxed);
    }

    fn add(&self, value: u64) {
        self.fetch_add(value, Ordering::Relaxed);
    }

    fn get_value(&self) -> u64 {
        self.load(Ordering::Relaxed)
    }

    fn get_and_reset_value(&self) -> u64 {
        self.swap(0, Ordering::Relaxed)
    }
}

impl AtomicallyUpdate<u64> for u64 {
    type AtomicTracker = AtomicU64;

    fn new_atomic_tracker(init: u64) -> Self::AtomicTracker {
        AtomicU64::new(init)
    }
}

impl AtomicTracker<i64> for AtomicI64 {
    fn store(&self, value: i64) {
        self.store(value, Ordering::Relaxed);
    }

    fn add(&self, value: i64) {
        self.fetch_add(value, Ordering::Relaxed);
    }

    fn get_value(&self) -> i64 {
        self.load(Ordering::Relaxed)
    }

    fn get_and_reset_value(&self) -> i64 {
        self.swap(0, Ordering::Relaxed)
    }
}

impl AtomicallyUpdate<i64> for i64 {
    type AtomicTracker = AtomicI64;

    fn new_atomic_tracker(init: i64) -> Self::AtomicTracker {
        AtomicI64::new(init)
    }
}

/// An `f64` stored as its bit pattern; additions retry a compare-and-swap.
pub(crate) struct F64AtomicTracker {
    inner: AtomicU64,
}

impl F64AtomicTracker {
    fn new(init: f64) -> Self {
        F64AtomicTracker {
            inner: AtomicU64::new(init.to_bits()),
        }
    }
}

impl AtomicTracker<f64> for F64AtomicTracker {
    fn store(&self, value: f64) {
        self.inner.store(value.to_bits(), Ordering::Relaxed);
    }

    fn add(&self, value: f64) {
        let mut current_value_as_u64 = self.inner.load(Ordering::Relaxed);

        loop {
            let current_value = f64::from_bits(current_value_as_u64);
            let new_value = current_value + value;
            let new_value_as_u64 = new_value.to_bits();
            match self.inner.compare_exchange(
                current_value_as_u64,
                new_value_as_u64,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                // Succeeded in updating the value
                Ok(_) => return,

                // Some other thread changed the value before this thread could update it.
                // Read the latest value again and try to swap it with the recomputed `new_value_as_u64`.
                Err(v) => current_value_as_u64 = v,
            }
        }
    }

    fn get_value(&self) -> f64 {
        f64::from_bits(self.inner.load(Ordering::Relaxed))
    }

    fn get_and_reset_value(&self) -> f64 {
        let zero_as_u64 = 0.0_f64.to_bits();
        f64::from_bits(self.inner.swap(zero_as_u64, Ordering::Relaxed))
    }
}

impl AtomicallyUpdate<f64> for f64 {
    type AtomicTracker = F64AtomicTracker;

    fn new_atomic_tracker(init: f64) -> Self::AtomicTracker {
        F64AtomicTracker::new(init)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counted(AtomicU64);

    impl Aggregator for Counted {
        type InitConfig = ();
        type PreComputedValue = u64;

        fn create(_init: &()) -> Self {
            Counted(AtomicU64::new(0))
        }

        fn update(&self, value: u64) {
            self.0.fetch_add(value, Ordering::Relaxed);
        }

        fn clone_and_reset(&self, _init: &()) -> Self {
            Counted(AtomicU64::new(self.0.swap(0, Ordering::Relaxed)))
        }
    }

    fn value_map(limit: usize) -> (ValueMap<Counted>, Arc<MetricDiagnostics>) {
        let diagnostics = Arc::new(MetricDiagnostics::default());
        (ValueMap::new((), limit, diagnostics.clone()), diagnostics)
    }

    #[test]
    fn can_store_u64_atomic_value() {
        let atomic = u64::new_atomic_tracker(0);
        let atomic_tracker = &atomic as &dyn AtomicTracker<u64>;

        let value = atomic.get_value();
        assert_eq!(value, 0);

        atomic_tracker.store(25);
        let value = atomic.get_value();
        assert_eq!(value, 25);
    }

    #[test]
    fn can_add_and_get_u64_atomic_value() {
        let atomic = u64::new_atomic_tracker(0);
        atomic.add(15);
        atomic.add(10);

        let value = atomic.get_value();
        assert_eq!(value, 25);
    }

    #[test]
    fn can_reset_u64_atomic_value() {
        let atomic = u64::new_atomic_tracker(0);
        atomic.add(15);

        let value = atomic.get_and_reset_value();
        let value2 = atomic.get_value();

        assert_eq!(value, 15, "Incorrect first value");
        assert_eq!(value2, 0, "Incorrect second value");
    }

    #[test]
    fn can_add_and_get_i64_atomic_value() {
        let atomic = i64::new_atomic_tracker(0);
        atomic.add(15);
        atomic.add(-10);

        let value = atomic.get_value();
        assert_eq!(value, 5);
    }

    #[test]
    fn can_add_and_get_f64_atomic_value() {
        let atomic = f64::new_atomic_tracker(0.0);
        atomic.add(15.3);
        atomic.add(10.4);

        let value = atomic.get_value();

        assert!(f64::abs(25.7 - value) < 0.0001);
    }

    #[test]
    fn can_reset_f64_atomic_value() {
        let atomic = f64::new_atomic_tracker(0.0);
        atomic.add(15.5);

        let value = atomic.get_and_reset_value();
        let value2 = atomic.get_value();

        assert!(f64::abs(15.5 - value) < 0.0001, "Incorrect first value");
        assert!(f64::abs(0.0 - value2) < 0.0001, "Incorrect second value");
    }

    #[test]
    fn f64_additions_from_many_threads_are_not_lost() {
        let atomic = Arc::new(f64::new_atomic_tracker(0.0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let atomic = atomic.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        atomic.add(1.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(atomic.get_value(), 4000.0);
    }

    #[test]
    fn attribute_order_does_not_split_series() {
        let (map, _) = value_map(10);
        map.measure(1, &[KeyValue::new("b", 1), KeyValue::new("a", 2)]);
        map.measure(2, &[KeyValue::new("a", 2), KeyValue::new("b", 1)]);

        let mut points = Vec::new();
        map.collect_readonly(&mut points, |attrs, tracker| {
            (attrs, tracker.0.load(Ordering::Relaxed))
        });
        assert_eq!(points.len(), 1);
        assert_eq!(
            points[0],
            (vec![KeyValue::new("a", 2), KeyValue::new("b", 1)], 3)
        );
    }

    #[test]
    fn delta_collection_starts_a_fresh_interval() {
        let (map, _) = value_map(10);
        map.measure(4, &[]);
        map.measure(5, &[KeyValue::new("k", "v")]);

        let mut points = Vec::new();
        map.collect_and_reset(&mut points, |attrs, tracker| {
            (attrs, tracker.0.into_inner())
        });
        assert_eq!(points.len(), 2);

        map.collect_and_reset(&mut points, |attrs, tracker| {
            (attrs, tracker.0.into_inner())
        });
        assert!(points.is_empty());
    }

    #[test]
    fn sets_beyond_the_limit_fold_into_overflow() {
        let (map, diagnostics) = value_map(2);
        for i in 0..5 {
            map.measure(1, &[KeyValue::new("id", i)]);
        }

        let mut points = Vec::new();
        map.collect_readonly(&mut points, |attrs, tracker| {
            (attrs, tracker.0.load(Ordering::Relaxed))
        });
        assert_eq!(points.len(), 3);
        let overflow = points
            .iter()
            .find(|(attrs, _)| attrs.as_slice() == overflow_attributes())
            .expect("overflow series");
        assert_eq!(overflow.1, 3);
        assert_eq!(diagnostics.overflowed_measurements(), 3);
    }
}
