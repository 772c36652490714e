use std::sync::Arc;

use telemetry::KeyValue;

use crate::metrics::data::{self, AggregatedMetrics, GaugeDataPoint, MetricData};
use crate::metrics::diagnostics::MetricDiagnostics;
use crate::metrics::Temporality;

use super::aggregate::{AggregateTimeInitiator, AttributeSetFilter};
use super::{
    Aggregator, AtomicTracker, AtomicallyUpdate, ComputeAggregation, Measure, Number, ValueMap,
};

/// this is reused by PrecomputedSum
pub(crate) struct Assign<T>
where
    T: AtomicallyUpdate<T>,
{
    pub(crate) value: T::AtomicTracker,
}

impl<T> Aggregator for Assign<T>
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
        self.value.store(value)
    }

    fn clone_and_reset(&self, _: &()) -> Self {
        Self {
            value: T::new_atomic_tracker(self.value.get_and_reset_value()),
        }
    }
}

/// Summarizes a set of measurements as the last one made.
///
/// A gauge reports its current value on every collect whatever the reader's
/// temporality. Observed gauges are reset so a series the callbacks stop
/// reporting disappears from the next collection.
pub(crate) struct LastValue<T: Number> {
    value_map: ValueMap<Assign<T>>,
    init_time: AggregateTimeInitiator,
    temporality: Temporality,
    reset_on_collect: bool,
    filter: AttributeSetFilter,
}

impl<T: Number> LastValue<T> {
    pub(crate) fn new(
        temporality: Temporality,
        reset_on_collect: bool,
        filter: AttributeSetFilter,
        cardinality_limit: usize,
        diagnostics: Arc<MetricDiagnostics>,
    ) -> Self {
        LastValue {
            value_map: ValueMap::new((), cardinality_limit, diagnostics),
            init_time: AggregateTimeInitiator::default(),
            temporality,
            reset_on_collect,
            filter,
        }
    }

    fn collect(&self, dest: Option<&mut MetricData<T>>) -> (usize, Option<MetricData<T>>) {
        let time = match self.temporality {
            Temporality::Delta => self.init_time.delta(),
            _ => self.init_time.cumulative(),
        };

        let mut new_agg = None;
        let s_data = match dest {
            Some(MetricData::Gauge(gauge)) => gauge,
            _ => new_agg.insert(data::Gauge {
                data_points: vec![],
                start_time: Some(time.start),
                time: time.current,
            }),
        };
        s_data.start_time = Some(time.start);
        s_data.time = time.current;

        if self.reset_on_collect {
            self.value_map
                .collect_and_reset(&mut s_data.data_points, |attributes, aggr| GaugeDataPoint {
                    attributes,
                    value: aggr.value.get_value(),
                });
        } else {
            self.value_map
                .collect_readonly(&mut s_data.data_points, |attributes, aggr| GaugeDataPoint {
                    attributes,
                    value: aggr.value.get_value(),
                });
        }

        (s_data.data_points.len(), new_agg.map(Into::into))
    }
}

impl<T> Measure<T> for LastValue<T>
where
    T: Number,
{
    fn call(&self, measurement: T, attrs: &[KeyValue]) {
        self.filter.apply(attrs, |filtered| {
            self.value_map.measure(measurement, filtered);
        })
    }
}

impl<T> ComputeAggregation for LastValue<T>
where
    T: Number,
{
    fn call(&self, dest: Option<&mut AggregatedMetrics>) -> (usize, Option<AggregatedMetrics>) {
        let data = dest.and_then(|d| T::extract_metrics_data_mut(d));
        let (len, new) = self.collect(data);
        (len, new.map(T::make_aggregated_metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(agg: &LastValue<i64>) -> Vec<i64> {
        match ComputeAggregation::call(agg, None).1 {
            Some(AggregatedMetrics::I64(MetricData::Gauge(gauge))) => {
                gauge.data_points.iter().map(|dp| dp.value).collect()
            }
            other => panic!("unexpected aggregation {other:?}"),
        }
    }

    fn last_value(temporality: Temporality, reset_on_collect: bool) -> LastValue<i64> {
        LastValue::new(
            temporality,
            reset_on_collect,
            AttributeSetFilter::default(),
            super::super::DEFAULT_CARDINALITY_LIMIT,
            Arc::new(MetricDiagnostics::default()),
        )
    }

    #[test]
    fn delta_keeps_reporting_the_current_value() {
        let agg = last_value(Temporality::Delta, false);
        Measure::call(&agg, 3, &[]);
        Measure::call(&agg, -7, &[]);
        assert_eq!(points(&agg), vec![-7]);
        assert_eq!(points(&agg), vec![-7]);
        Measure::call(&agg, 4, &[]);
        assert_eq!(points(&agg), vec![4]);
    }

    #[test]
    fn observed_series_is_dropped_when_not_observed_again() {
        let agg = last_value(Temporality::Cumulative, true);
        Measure::call(&agg, 5, &[]);
        assert_eq!(points(&agg), vec![5]);
        assert!(points(&agg).is_empty());
    }

    #[test]
    fn cumulative_keeps_the_last_value() {
        let agg = last_value(Temporality::Cumulative, false);
        Measure::call(&agg, 3, &[]);
        assert_eq!(points(&agg), vec![3]);
        assert_eq!(points(&agg), vec![3]);
    }
}
