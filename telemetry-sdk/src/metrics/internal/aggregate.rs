use std::{
    collections::HashSet,
    marker,
    mem::replace,
    ops::DerefMut,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use telemetry::time::now;
use telemetry::{Key, KeyValue};

use crate::metrics::{data::AggregatedMetrics, diagnostics::MetricDiagnostics, Temporality};

use super::{
    histogram::Histogram, last_value::LastValue, precomputed_sum::PrecomputedSum, sum::Sum,
    Number,
};

/// Receives measurements to be aggregated.
pub(crate) trait Measure<T>: Send + Sync + 'static {
    fn call(&self, measurement: T, attrs: &[KeyValue]);
}

/// Stores the aggregate of measurements into the aggregation and returns the number
/// of aggregate data-points output.
pub(crate) trait ComputeAggregation: Send + Sync + 'static {
    /// Compute the new aggregation and store in `dest`.
    ///
    /// If no initial aggregation exists, or `dest` holds a different kind of
    /// aggregation, the returned option contains a new aggregation with the
    /// data from the current collection cycle.
    fn call(&self, dest: Option<&mut AggregatedMetrics>) -> (usize, Option<AggregatedMetrics>);
}

/// Separate `measure` and `collect` functions for an aggregate.
pub(crate) struct AggregateFns<T> {
    pub(crate) measure: Arc<dyn Measure<T>>,
    pub(crate) collect: Arc<dyn ComputeAggregation>,
}

/// Creates aggregate functions out of aggregate instance
impl<A, T> From<A> for AggregateFns<T>
where
    A: Measure<T> + ComputeAggregation,
{
    fn from(value: A) -> Self {
        let inst = Arc::new(value);
        Self {
            measure: inst.clone(),
            collect: inst,
        }
    }
}

pub(crate) struct AggregateTime {
    pub(crate) start: SystemTime,
    pub(crate) current: SystemTime,
}

/// Tracks the start of the current interval for one aggregation.
pub(crate) struct AggregateTimeInitiator(Mutex<SystemTime>);

impl AggregateTimeInitiator {
    /// Closes the current interval and opens the next one.
    pub(crate) fn delta(&self) -> AggregateTime {
        let current_time = now();
        let start_time = self
            .0
            .lock()
            .map(|mut start| replace(start.deref_mut(), current_time))
            .unwrap_or(current_time);
        AggregateTime {
            start: start_time,
            current: current_time,
        }
    }

    pub(crate) fn cumulative(&self) -> AggregateTime {
        let current_time = now();
        let start_time = self.0.lock().map(|start| *start).unwrap_or(current_time);
        AggregateTime {
            start: start_time,
            current: current_time,
        }
    }
}

impl Default for AggregateTimeInitiator {
    fn default() -> Self {
        Self(Mutex::new(now()))
    }
}

/// Which attribute keys survive into the aggregation key of a stream.
#[derive(Clone, Debug, Default)]
pub(crate) struct AttributeSetFilter {
    allowed: Option<Arc<HashSet<Key>>>,
    denied: Option<Arc<HashSet<Key>>>,
}

impl AttributeSetFilter {
    pub(crate) fn new(allowed: Option<Arc<HashSet<Key>>>, denied: Option<Arc<HashSet<Key>>>) -> Self {
        Self { allowed, denied }
    }

    fn keeps(&self, kv: &KeyValue) -> bool {
        self.allowed.as_ref().map_or(true, |a| a.contains(&kv.key))
            && self.denied.as_ref().map_or(true, |d| !d.contains(&kv.key))
    }

    /// Runs `run` with the filtered attributes. Allocates only when an
    /// attribute is actually removed.
    pub(crate) fn apply(&self, attrs: &[KeyValue], run: impl FnOnce(&[KeyValue])) {
        if (self.allowed.is_none() && self.denied.is_none()) || attrs.iter().all(|kv| self.keeps(kv)) {
            run(attrs);
        } else {
            let filtered_attrs: Vec<KeyValue> =
                attrs.iter().filter(|kv| self.keeps(kv)).cloned().collect();
            run(&filtered_attrs);
        }
    }
}

/// Builds aggregate functions
pub(crate) struct AggregateBuilder<T> {
    /// The temporality used for the returned aggregate functions.
    temporality: Temporality,

    /// The attribute filter the aggregate function will use on the input of
    /// measurements.
    filter: AttributeSetFilter,

    cardinality_limit: usize,

    diagnostics: Arc<MetricDiagnostics>,

    _marker: marker::PhantomData<T>,
}

impl<T: Number> AggregateBuilder<T> {
    pub(crate) fn new(
        temporality: Temporality,
        filter: AttributeSetFilter,
        cardinality_limit: usize,
        diagnostics: Arc<MetricDiagnostics>,
    ) -> Self {
        AggregateBuilder {
            temporality,
            filter,
            cardinality_limit,
            diagnostics,
            _marker: marker::PhantomData,
        }
    }

    /// Builds a last-value aggregate function input and output.
    pub(crate) fn last_value(&self, reset_on_collect: bool) -> AggregateFns<T> {
        LastValue::new(
            self.temporality,
            reset_on_collect,
            self.filter.clone(),
            self.cardinality_limit,
            self.diagnostics.clone(),
        )
        .into()
    }

    /// Builds a precomputed sum aggregate function input and output.
    pub(crate) fn precomputed_sum(&self, monotonic: bool) -> AggregateFns<T> {
        PrecomputedSum::new(
            self.temporality,
            self.filter.clone(),
            monotonic,
            self.cardinality_limit,
            self.diagnostics.clone(),
        )
        .into()
    }

    /// Builds a sum aggregate function input and output.
    pub(crate) fn sum(&self, monotonic: bool) -> AggregateFns<T> {
        Sum::new(
            self.temporality,
            self.filter.clone(),
            monotonic,
            self.cardinality_limit,
            self.diagnostics.clone(),
        )
        .into()
    }

    /// Builds a histogram aggregate function input and output.
    pub(crate) fn explicit_bucket_histogram(
        &self,
        boundaries: Vec<f64>,
        record_min_max: bool,
        record_sum: bool,
    ) -> AggregateFns<T> {
        Histogram::new(
            self.temporality,
            self.filter.clone(),
            boundaries,
            record_min_max,
            record_sum,
            self.cardinality_limit,
            self.diagnostics.clone(),
        )
        .into()
    }
}

#[cfg(test)]
mod tests {
    use crate::metrics::data::{
        Gauge, GaugeDataPoint, Histogram, HistogramDataPoint, MetricData, Sum, SumDataPoint,
    };
    use crate::metrics::internal::DEFAULT_CARDINALITY_LIMIT;
    use std::vec;

    use super::*;

    fn builder<T: Number>(temporality: Temporality) -> AggregateBuilder<T> {
        AggregateBuilder::new(
            temporality,
            AttributeSetFilter::default(),
            DEFAULT_CARDINALITY_LIMIT,
            Arc::new(MetricDiagnostics::default()),
        )
    }

    fn opposite(temporality: Temporality) -> Temporality {
        if temporality == Temporality::Delta {
            Temporality::Cumulative
        } else {
            Temporality::Delta
        }
    }

    #[test]
    fn last_value_aggregation() {
        let AggregateFns { measure, collect } =
            builder::<u64>(Temporality::Cumulative).last_value(false);
        let mut a = AggregatedMetrics::U64(MetricData::Gauge(Gauge {
            data_points: vec![GaugeDataPoint {
                attributes: vec![KeyValue::new("a", 1)],
                value: 1u64,
            }],
            start_time: Some(now()),
            time: now(),
        }));
        let new_attributes = [KeyValue::new("b", 2)];
        measure.call(2, &new_attributes[..]);

        let (count, new_agg) = collect.call(Some(&mut a));

        assert_eq!(count, 1);
        assert!(new_agg.is_none());
        let AggregatedMetrics::U64(MetricData::Gauge(a)) = a else {
            unreachable!()
        };
        assert_eq!(a.data_points.len(), 1);
        assert_eq!(a.data_points[0].attributes, new_attributes.to_vec());
        assert_eq!(a.data_points[0].value, 2);
    }

    #[test]
    fn precomputed_sum_aggregation() {
        for temporality in [Temporality::Delta, Temporality::Cumulative] {
            let AggregateFns { measure, collect } =
                builder::<u64>(temporality).precomputed_sum(true);
            let mut a = AggregatedMetrics::U64(MetricData::Sum(Sum {
                data_points: vec![
                    SumDataPoint {
                        attributes: vec![KeyValue::new("a1", 1)],
                        value: 1u64,
                    },
                    SumDataPoint {
                        attributes: vec![KeyValue::new("a2", 1)],
                        value: 2u64,
                    },
                ],
                start_time: now(),
                time: now(),
                temporality: opposite(temporality),
                is_monotonic: false,
            }));
            let new_attributes = [KeyValue::new("b", 2)];
            measure.call(3, &new_attributes[..]);

            let (count, new_agg) = collect.call(Some(&mut a));

            assert_eq!(count, 1);
            assert!(new_agg.is_none());
            let AggregatedMetrics::U64(MetricData::Sum(a)) = a else {
                unreachable!()
            };
            assert_eq!(a.temporality, temporality);
            assert!(a.is_monotonic);
            assert_eq!(a.data_points.len(), 1);
            assert_eq!(a.data_points[0].attributes, new_attributes.to_vec());
            assert_eq!(a.data_points[0].value, 3);
        }
    }

    #[test]
    fn sum_aggregation() {
        for temporality in [Temporality::Delta, Temporality::Cumulative] {
            let AggregateFns { measure, collect } = builder::<u64>(temporality).sum(true);
            let mut a = AggregatedMetrics::U64(MetricData::Sum(Sum {
                data_points: vec![
                    SumDataPoint {
                        attributes: vec![KeyValue::new("a1", 1)],
                        value: 1u64,
                    },
                    SumDataPoint {
                        attributes: vec![KeyValue::new("a2", 1)],
                        value: 2u64,
                    },
                ],
                start_time: now(),
                time: now(),
                temporality: opposite(temporality),
                is_monotonic: false,
            }));
            let new_attributes = [KeyValue::new("b", 2)];
            measure.call(3, &new_attributes[..]);

            let (count, new_agg) = collect.call(Some(&mut a));

            assert_eq!(count, 1);
            assert!(new_agg.is_none());
            let AggregatedMetrics::U64(MetricData::Sum(a)) = a else {
                unreachable!()
            };
            assert_eq!(a.temporality, temporality);
            assert!(a.is_monotonic);
            assert_eq!(a.data_points.len(), 1);
            assert_eq!(a.data_points[0].attributes, new_attributes.to_vec());
            assert_eq!(a.data_points[0].value, 3);
        }
    }

    #[test]
    fn explicit_bucket_histogram_aggregation() {
        for temporality in [Temporality::Delta, Temporality::Cumulative] {
            let AggregateFns { measure, collect } =
                builder::<u64>(temporality).explicit_bucket_histogram(vec![1.0], true, true);
            let mut a = AggregatedMetrics::U64(MetricData::Histogram(Histogram {
                data_points: vec![HistogramDataPoint {
                    attributes: vec![KeyValue::new("a1", 1)],
                    count: 2,
                    bounds: vec![1.0, 2.0],
                    bucket_counts: vec![0, 1, 1],
                    min: None,
                    max: None,
                    sum: 3u64,
                }],
                start_time: now(),
                time: now(),
                temporality: opposite(temporality),
            }));
            let new_attributes = [KeyValue::new("b", 2)];
            measure.call(3, &new_attributes[..]);

            let (count, new_agg) = collect.call(Some(&mut a));

            assert_eq!(count, 1);
            assert!(new_agg.is_none());
            let AggregatedMetrics::U64(MetricData::Histogram(a)) = a else {
                unreachable!()
            };
            assert_eq!(a.temporality, temporality);
            assert_eq!(a.data_points.len(), 1);
            assert_eq!(a.data_points[0].attributes, new_attributes.to_vec());
            assert_eq!(a.data_points[0].count, 1);
            assert_eq!(a.data_points[0].bounds, vec![1.0]);
            assert_eq!(a.data_points[0].bucket_counts, vec![0, 1]);
            assert_eq!(a.data_points[0].min, Some(3));
            assert_eq!(a.data_points[0].max, Some(3));
            assert_eq!(a.data_points[0].sum, 3);
        }
    }

    #[test]
    fn mismatched_destination_yields_new_aggregation() {
        let AggregateFns { measure, collect } = builder::<f64>(Temporality::Cumulative).sum(false);
        measure.call(1.5, &[]);
        let mut a = AggregatedMetrics::U64(MetricData::Gauge(Gauge {
            data_points: vec![],
            start_time: None,
            time: now(),
        }));

        let (count, new_agg) = collect.call(Some(&mut a));

        assert_eq!(count, 1);
        match new_agg {
            Some(AggregatedMetrics::F64(MetricData::Sum(sum))) => {
                assert!(!sum.is_monotonic);
                assert_eq!(sum.data_points[0].value, 1.5);
            }
            other => panic!("unexpected aggregation {other:?}"),
        }
    }

    #[test]
    fn filter_keeps_only_allowed_and_not_denied_keys() {
        let allowed: HashSet<Key> = [Key::new("region"), Key::new("host")].into_iter().collect();
        let denied: HashSet<Key> = [Key::new("host")].into_iter().collect();
        let filter = AttributeSetFilter::new(Some(Arc::new(allowed)), Some(Arc::new(denied)));
        let attrs = [
            KeyValue::new("region", "us"),
            KeyValue::new("host", "a"),
            KeyValue::new("pid", 1),
        ];
        let mut seen = vec![];
        filter.apply(&attrs, |filtered| seen = filtered.to_vec());
        assert_eq!(seen, vec![KeyValue::new("region", "us")]);
    }
}
