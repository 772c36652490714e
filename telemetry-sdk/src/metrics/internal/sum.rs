use std::sync::Arc;

use telemetry::KeyValue;

use crate::metrics::data::{self, AggregatedMetrics, MetricData, SumDataPoint};
use crate::metrics::diagnostics::MetricDiagnostics;
use crate::metrics::Temporality;

use super::aggregate::{AggregateTimeInitiator, AttributeSetFilter};
use super::{Aggregator, AtomicTracker, ComputeAggregation, Measure, Number};
use super::{AtomicallyUpdate, ValueMap};

struct Increment<T>
where
    T: AtomicallyUpdate<T>,
{
    value: T::AtomicTracker,
}

impl<T> Aggregator for Increment<T>
where
    T: Number,
{
    type InitConfig = ();
    type PreComputedValue = T;

    fn create(_init: &()) -> Self {
        Self {
            value: T::new_atomic_tracker(T::default()),
        }
    }

    fn update(&self, value: T) {
        self.value.add(value)
    }

    fn clone_and_reset(&self, _: &()) -> Self {
        Self {
            value: T::new_atomic_tracker(self.value.get_and_reset_value()),
        }
    }
}

/// Summarizes a set of measurements made as their arithmetic sum.
pub(crate) struct Sum<T: Number> {
    value_map: ValueMap<Increment<T>>,
    init_time: AggregateTimeInitiator,
    temporality: Temporality,
    filter: AttributeSetFilter,
    monotonic: bool,
}

impl<T: Number> Sum<T> {
    /// Returns an aggregator that summarizes a set of measurements as their
    /// arithmetic sum.
    ///
    /// Each sum is scoped by attributes and the aggregation cycle the measurements
    /// were made in.
    pub(crate) fn new(
        temporality: Temporality,
        filter: AttributeSetFilter,
        monotonic: bool,
        cardinality_limit: usize,
        diagnostics: Arc<MetricDiagnostics>,
    ) -> Self {
        Sum {
            value_map: ValueMap::new((), cardinality_limit, diagnostics),
            init_time: AggregateTimeInitiator::default(),
            temporality,
            filter,
            monotonic,
        }
    }

    fn delta(&self, dest: Option<&mut MetricData<T>>) -> (usize, Option<MetricData<T>>) {
        let time = self.init_time.delta();

        let mut new_agg = None;
        let s_data = match dest {
            Some(MetricData::Sum(sum)) => sum,
            _ => new_agg.insert(data::Sum {
                data_points: vec![],
                start_time: time.start,
                time: time.current,
                temporality: Temporality::Delta,
                is_monotonic: self.monotonic,
            }),
        };
        s_data.start_time = time.start;
        s_data.time = time.current;
        s_data.temporality = Temporality::Delta;
        s_data.is_monotonic = self.monotonic;

        self.value_map
            .collect_and_reset(&mut s_data.data_points, |attributes, aggr| SumDataPoint {
                attributes,
                value: aggr.value.get_value(),
            });

        (s_data.data_points.len(), new_agg.map(Into::into))
    }

    fn cumulative(&self, dest: Option<&mut MetricData<T>>) -> (usize, Option<MetricData<T>>) {
        let time = self.init_time.cumulative();

        let mut new_agg = None;
        let s_data = match dest {
            Some(MetricData::Sum(sum)) => sum,
            _ => new_agg.insert(data::Sum {
                data_points: vec![],
                start_time: time.start,
                time: time.current,
                temporality: Temporality::Cumulative,
                is_monotonic: self.monotonic,
            }),
        };
        s_data.start_time = time.start;
        s_data.time = time.current;
        s_data.temporality = Temporality::Cumulative;
        s_data.is_monotonic = self.monotonic;

        self.value_map
            .collect_readonly(&mut s_data.data_points, |attributes, aggr| SumDataPoint {
                attributes,
                value: aggr.value.get_value(),
            });

        (s_data.data_points.len(), new_agg.map(Into::into))
    }
}

impl<T> Measure<T> for Sum<T>
where
    T: Number,
{
    fn call(&self, measurement: T, attrs: &[KeyValue]) {
        self.filter.apply(attrs, |filtered| {
            self.value_map.measure(measurement, filtered);
        })
    }
}

impl<T> ComputeAggregation for Sum<T>
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

    fn sum(temporality: Temporality) -> Sum<u64> {
        Sum::new(
            temporality,
            AttributeSetFilter::default(),
            true,
            super::super::DEFAULT_CARDINALITY_LIMIT,
            Arc::new(MetricDiagnostics::default()),
        )
    }

    fn collected(agg: &Sum<u64>) -> Vec<u64> {
        let (_, data) = ComputeAggregation::call(agg, None);
        match data {
            Some(AggregatedMetrics::U64(MetricData::Sum(sum))) => {
                sum.data_points.iter().map(|dp| dp.value).collect()
            }
            other => panic!("unexpected aggregation {other:?}"),
        }
    }

    #[test]
    fn delta_reports_interval_then_nothing() {
        let agg = sum(Temporality::Delta);
        for v in [2, 3, 5] {
            Measure::call(&agg, v, &[]);
        }
        assert_eq!(collected(&agg), vec![10]);
        assert!(collected(&agg).is_empty());
    }

    #[test]
    fn cumulative_keeps_growing() {
        let agg = sum(Temporality::Cumulative);
        let mut reported = vec![];
        for v in [1, 2, 3] {
            Measure::call(&agg, v, &[KeyValue::new("k", "v")]);
            reported.extend(collected(&agg));
        }
        assert_eq!(reported, vec![1, 3, 6]);
    }
}
