use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use telemetry::KeyValue;

use crate::metrics::data::{self, AggregatedMetrics, MetricData, SumDataPoint};
use crate::metrics::diagnostics::MetricDiagnostics;
use crate::metrics::Temporality;

use super::aggregate::{AggregateTimeInitiator, AttributeSetFilter};
use super::last_value::Assign;
use super::{AtomicTracker, ComputeAggregation, Measure, Number, ValueMap};

/// Summarizes a set of pre-computed sums as their arithmetic sum.
///
/// Observed values are running totals. Delta temporality reports the change
/// since the previous collection.
pub(crate) struct PrecomputedSum<T: Number> {
    value_map: ValueMap<Assign<T>>,
    init_time: AggregateTimeInitiator,
    temporality: Temporality,
    filter: AttributeSetFilter,
    monotonic: bool,
    reported: Mutex<HashMap<Vec<KeyValue>, T>>,
}

impl<T: Number> PrecomputedSum<T> {
    pub(crate) fn new(
        temporality: Temporality,
        filter: AttributeSetFilter,
        monotonic: bool,
        cardinality_limit: usize,
        diagnostics: Arc<MetricDiagnostics>,
    ) -> Self {
        PrecomputedSum {
            value_map: ValueMap::new((), cardinality_limit, diagnostics),
            init_time: AggregateTimeInitiator::default(),
            temporality,
            filter,
            monotonic,
            reported: Mutex::new(Default::default()),
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

        let mut reported = match self.reported.lock() {
            Ok(r) => r,
            Err(_) => return (0, None),
        };
        let mut new_reported = HashMap::with_capacity(reported.len());

        self.value_map
            .collect_and_reset(&mut s_data.data_points, |attributes, aggr| {
                let value = aggr.value.get_value();
                new_reported.insert(attributes.clone(), value);
                let delta = value - *reported.get(&attributes).unwrap_or(&T::default());
                SumDataPoint {
                    attributes,
                    value: delta,
                }
            });

        *reported = new_reported;
        drop(reported); // drop before values guard is dropped

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

impl<T> Measure<T> for PrecomputedSum<T>
where
    T: Number,
{
    fn call(&self, measurement: T, attrs: &[KeyValue]) {
        self.filter.apply(attrs, |filtered| {
            self.value_map.measure(measurement, filtered);
        })
    }
}

impl<T> ComputeAggregation for PrecomputedSum<T>
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

    #[test]
    fn delta_reports_change_between_observations() {
        let agg = PrecomputedSum::<u64>::new(
            Temporality::Delta,
            AttributeSetFilter::default(),
            true,
            super::super::DEFAULT_CARDINALITY_LIMIT,
            Arc::new(MetricDiagnostics::default()),
        );
        let attrs = [KeyValue::new("cpu", 0)];
        let mut reported = vec![];
        for total in [10, 25, 25] {
            Measure::call(&agg, total, &attrs);
            match ComputeAggregation::call(&agg, None).1 {
                Some(AggregatedMetrics::U64(MetricData::Sum(sum))) => {
                    reported.push(sum.data_points[0].value)
                }
                other => panic!("unexpected aggregation {other:?}"),
            }
        }
        assert_eq!(reported, vec![10, 15, 0]);
    }
}
