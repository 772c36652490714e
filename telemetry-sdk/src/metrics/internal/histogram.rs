use std::mem::replace;
use std::ops::DerefMut;
use std::sync::{Arc, Mutex};

use telemetry::KeyValue;

use crate::metrics::data::{self, AggregatedMetrics, HistogramDataPoint, MetricData};
use crate::metrics::diagnostics::MetricDiagnostics;
use crate::metrics::Temporality;

use super::aggregate::{AggregateTimeInitiator, AttributeSetFilter};
use super::{Aggregator, ComputeAggregation, Measure, Number, ValueMap};

struct HistogramTracker<T> {
    buckets: Mutex<Buckets<T>>,
}

impl<T> Aggregator for HistogramTracker<T>
where
    T: Number,
{
    /// Number of buckets
    type InitConfig = usize;
    /// Value and bucket index
    type PreComputedValue = (T, usize);

    fn update(&self, (value, index): (T, usize)) {
        let mut buckets = self.buckets.lock().unwrap_or_else(|err| err.into_inner());

        buckets.bin(index, value);
        buckets.sum(value);
    }

    fn create(count: &usize) -> Self {
        HistogramTracker {
            buckets: Mutex::new(Buckets::<T>::new(*count)),
        }
    }

    fn clone_and_reset(&self, count: &usize) -> Self {
        let mut current = self.buckets.lock().unwrap_or_else(|err| err.into_inner());
        let cloned = replace(current.deref_mut(), Buckets::new(*count));
        Self {
            buckets: Mutex::new(cloned),
        }
    }
}

#[derive(Default, Clone)]
struct Buckets<T> {
    counts: Vec<u64>,
    count: u64,
    total: T,
    min: T,
    max: T,
}

impl<T: Number> Buckets<T> {
    /// returns buckets with `n` bins.
    fn new(n: usize) -> Buckets<T> {
        Buckets {
            counts: vec![0; n],
            min: T::max(),
            max: T::min(),
            ..Default::default()
        }
    }

    fn sum(&mut self, value: T) {
        self.total = self.total.add_saturating(value);
    }

    fn bin(&mut self, idx: usize, value: T) {
        if let Some(count) = self.counts.get_mut(idx) {
            *count += 1;
        }
        self.count += 1;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value
        }
    }
}

/// Summarizes a set of measurements as a histogram with explicitly defined
/// buckets.
pub(crate) struct Histogram<T: Number> {
    value_map: ValueMap<HistogramTracker<T>>,
    init_time: AggregateTimeInitiator,
    temporality: Temporality,
    filter: AttributeSetFilter,
    bounds: Vec<f64>,
    record_min_max: bool,
    record_sum: bool,
}

impl<T: Number> Histogram<T> {
    /// `bounds` must be finite and strictly increasing.
    pub(crate) fn new(
        temporality: Temporality,
        filter: AttributeSetFilter,
        bounds: Vec<f64>,
        record_min_max: bool,
        record_sum: bool,
        cardinality_limit: usize,
        diagnostics: Arc<MetricDiagnostics>,
    ) -> Self {
        let buckets_count = bounds.len() + 1;
        Histogram {
            value_map: ValueMap::new(buckets_count, cardinality_limit, diagnostics),
            init_time: AggregateTimeInitiator::default(),
            temporality,
            filter,
            bounds,
            record_min_max,
            record_sum,
        }
    }

    fn data_point(&self, attributes: Vec<KeyValue>, b: Buckets<T>) -> HistogramDataPoint<T> {
        HistogramDataPoint {
            attributes,
            count: b.count,
            bounds: self.bounds.clone(),
            bucket_counts: b.counts,
            sum: if self.record_sum {
                b.total
            } else {
                T::default()
            },
            min: if self.record_min_max {
                Some(b.min)
            } else {
                None
            },
            max: if self.record_min_max {
                Some(b.max)
            } else {
                None
            },
        }
    }

    fn delta(&self, dest: Option<&mut MetricData<T>>) -> (usize, Option<MetricData<T>>) {
        let time = self.init_time.delta();

        let mut new_agg = None;
        let h = match dest {
            Some(MetricData::Histogram(hist)) => hist,
            _ => new_agg.insert(data::Histogram {
                data_points: vec![],
                start_time: time.start,
                time: time.current,
                temporality: Temporality::Delta,
            }),
        };
        h.start_time = time.start;
        h.time = time.current;
        h.temporality = Temporality::Delta;

        self.value_map
            .collect_and_reset(&mut h.data_points, |attributes, aggr| {
                let b = aggr
                    .buckets
                    .into_inner()
                    .unwrap_or_else(|err| err.into_inner());
                self.data_point(attributes, b)
            });

        (h.data_points.len(), new_agg.map(Into::into))
    }

    fn cumulative(&self, dest: Option<&mut MetricData<T>>) -> (usize, Option<MetricData<T>>) {
        let time = self.init_time.cumulative();

        let mut new_agg = None;
        let h = match dest {
            Some(MetricData::Histogram(hist)) => hist,
            _ => new_agg.insert(data::Histogram {
                data_points: vec![],
                start_time: time.start,
                time: time.current,
                temporality: Temporality::Cumulative,
            }),
        };
        h.start_time = time.start;
        h.time = time.current;
        h.temporality = Temporality::Cumulative;

        self.value_map
            .collect_readonly(&mut h.data_points, |attributes, aggr| {
                let b = aggr
                    .buckets
                    .lock()
                    .unwrap_or_else(|err| err.into_inner())
                    .clone();
                self.data_point(attributes, b)
            });

        (h.data_points.len(), new_agg.map(Into::into))
    }
}

impl<T> Measure<T> for Histogram<T>
where
    T: Number,
{
    fn call(&self, measurement: T, attrs: &[KeyValue]) {
        let f = measurement.into_float();
        // This search will return an index in the range `[0, bounds.len()]`, where
        // it will return `bounds.len()` if value is greater than the last element
        // of `bounds`. This aligns with the buckets in that the length of buckets
        // is `bounds.len()+1`, with the last bucket representing:
        // `(bounds[bounds.len()-1], +∞)`.
        let index = self.bounds.partition_point(|&x| x < f);

        self.filter.apply(attrs, |filtered| {
            self.value_map.measure((measurement, index), filtered);
        })
    }
}

impl<T> ComputeAggregation for Histogram<T>
where
    T: Number,
{
    fn call(&self, dest: Option<&mut AggregatedMetrics>) -> (usize, Option<AggregatedMetrics>) {
        let data = dest.and_then(|d| T::extract_metrics_data_mut(d));
        let (len, new) = match self.temporality {
            Temporality::Delta => self.delta(data),
            _ => self.cumulative(data),
        };
        (len, new.map(T::make_aggregated_metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn histogram(temporality: Temporality, record_min_max: bool) -> Histogram<f64> {
        Histogram::new(
            temporality,
            AttributeSetFilter::default(),
            vec![0.0, 5.0, 10.0],
            record_min_max,
            true,
            super::super::DEFAULT_CARDINALITY_LIMIT,
            Arc::new(MetricDiagnostics::default()),
        )
    }

    fn point(agg: &Histogram<f64>) -> Option<HistogramDataPoint<f64>> {
        match ComputeAggregation::call(agg, None).1 {
            Some(AggregatedMetrics::F64(MetricData::Histogram(mut hist))) => hist.data_points.pop(),
            other => panic!("unexpected aggregation {other:?}"),
        }
    }

    #[rstest]
    #[case(-1.0, 0)]
    #[case(0.0, 0)]
    #[case(0.5, 1)]
    #[case(5.0, 1)]
    #[case(10.0, 2)]
    #[case(10.5, 3)]
    fn value_lands_in_first_bucket_with_bound_at_least_value(
        #[case] value: f64,
        #[case] bucket: usize,
    ) {
        let agg = histogram(Temporality::Cumulative, true);
        Measure::call(&agg, value, &[]);
        let dp = point(&agg).expect("one point");
        let mut expected = vec![0; 4];
        expected[bucket] = 1;
        assert_eq!(dp.bucket_counts, expected);
    }

    #[test]
    fn delta_resets_after_snapshot() {
        let agg = histogram(Temporality::Delta, true);
        for v in [1.0, 7.0, 12.0] {
            Measure::call(&agg, v, &[]);
        }
        let dp = point(&agg).expect("one point");
        assert_eq!(dp.count, 3);
        assert_eq!(dp.sum, 20.0);
        assert_eq!(dp.min, Some(1.0));
        assert_eq!(dp.max, Some(12.0));
        assert!(point(&agg).is_none());
    }

    #[test]
    fn min_max_can_be_disabled() {
        let agg = histogram(Temporality::Cumulative, false);
        Measure::call(&agg, 3.0, &[]);
        let dp = point(&agg).expect("one point");
        assert_eq!(dp.min, None);
        assert_eq!(dp.max, None);
    }

    #[test]
    fn integer_sum_saturates_instead_of_overflowing() {
        let agg = Histogram::<u64>::new(
            Temporality::Cumulative,
            AttributeSetFilter::default(),
            vec![0.0, 5.0, 10.0],
            true,
            true,
            super::super::DEFAULT_CARDINALITY_LIMIT,
            Arc::new(MetricDiagnostics::default()),
        );
        for v in [u64::MAX, 1, 7] {
            Measure::call(&agg, v, &[]);
        }
        let dp = match ComputeAggregation::call(&agg, None).1 {
            Some(AggregatedMetrics::U64(MetricData::Histogram(mut hist))) => {
                hist.data_points.pop().expect("one point")
            }
            other => panic!("unexpected aggregation {other:?}"),
        };
        assert_eq!(dp.count, 3);
        assert_eq!(dp.sum, u64::MAX);
        assert_eq!(dp.min, Some(1));
        assert_eq!(dp.max, Some(u64::MAX));
    }

    #[test]
    fn poisoned_bucket_lock_still_records() {
        let tracker = Arc::new(HistogramTracker::<u64>::create(&4));
        let poisoner = Arc::clone(&tracker);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.buckets.lock().unwrap();
            panic!("poison the bucket lock");
        })
        .join();
        assert!(tracker.buckets.is_poisoned());

        tracker.update((7, 2));
        let buckets = tracker.buckets.lock().unwrap_or_else(|err| err.into_inner());
        assert_eq!(buckets.count, 1);
        assert_eq!(buckets.counts, vec![0, 0, 1, 0]);
        assert_eq!(buckets.total, 7);
    }
}
