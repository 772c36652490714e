//! Snapshots handed from readers to exporters.
//!
//! A collection fills one [ResourceMetrics]: per meter scope a list of
//! [Metric]s, each holding the points of one stream typed by number
//! ([AggregatedMetrics]) and by aggregation ([MetricData]).

use std::{borrow::Cow, time::SystemTime};

use telemetry::{InstrumentationScope, KeyValue};

use crate::Resource;

mod temporality;

pub use temporality::Temporality;

/// Everything one collection produced, tagged with the provider's [Resource].
///
/// Readers fill the same value on every collection, reusing its allocations.
#[derive(Debug, Clone)]
pub struct ResourceMetrics {
    #[allow(missing_docs)]
    pub resource: Resource,
    /// One entry per meter scope that had streams to report.
    pub scope_metrics: Vec<ScopeMetrics>,
}

impl Default for ResourceMetrics {
    fn default() -> Self {
        ResourceMetrics {
            resource: Resource::empty(),
            scope_metrics: Vec::new(),
        }
    }
}

impl ResourceMetrics {
    /// The stream named `metric_name` under the scope named `scope_name`.
    pub fn find_metric(&self, scope_name: &str, metric_name: &str) -> Option<&Metric> {
        self.scope_metrics
            .iter()
            .filter(|sm| sm.scope.name() == scope_name)
            .flat_map(|sm| sm.metrics.iter())
            .find(|m| m.name == metric_name)
    }
}

/// Streams of the meters sharing one scope.
#[derive(Default, Debug, Clone)]
pub struct ScopeMetrics {
    #[allow(missing_docs)]
    pub scope: InstrumentationScope,
    /// Streams in instrument creation order.
    pub metrics: Vec<Metric>,
}

/// One stream, named after the instrument unless a view renamed it.
///
/// A single instrument yields several `Metric`s when several views match it.
#[derive(Debug, Clone)]
pub struct Metric {
    #[allow(missing_docs)]
    pub name: Cow<'static, str>,
    #[allow(missing_docs)]
    pub description: Cow<'static, str>,
    #[allow(missing_docs)]
    pub unit: Cow<'static, str>,
    #[allow(missing_docs)]
    pub data: AggregatedMetrics,
}

/// [MetricData] by number type.
#[derive(Debug, Clone)]
pub enum AggregatedMetrics {
    #[allow(missing_docs)]
    F64(MetricData<f64>),
    #[allow(missing_docs)]
    U64(MetricData<u64>),
    #[allow(missing_docs)]
    I64(MetricData<i64>),
}

/// Points of one stream by aggregation.
#[derive(Debug, Clone)]
pub enum MetricData<T> {
    /// From `LastValue`.
    Gauge(Gauge<T>),
    /// From `Sum`, including the observable counters.
    Sum(Sum<T>),
    /// From `ExplicitBucketHistogram`.
    Histogram(Histogram<T>),
}

impl From<MetricData<f64>> for AggregatedMetrics {
    fn from(value: MetricData<f64>) -> Self {
        AggregatedMetrics::F64(value)
    }
}

impl From<MetricData<i64>> for AggregatedMetrics {
    fn from(value: MetricData<i64>) -> Self {
        AggregatedMetrics::I64(value)
    }
}

impl From<MetricData<u64>> for AggregatedMetrics {
    fn from(value: MetricData<u64>) -> Self {
        AggregatedMetrics::U64(value)
    }
}

impl<T> From<Gauge<T>> for MetricData<T> {
    fn from(value: Gauge<T>) -> Self {
        MetricData::Gauge(value)
    }
}

impl<T> From<Sum<T>> for MetricData<T> {
    fn from(value: Sum<T>) -> Self {
        MetricData::Sum(value)
    }
}

impl<T> From<Histogram<T>> for MetricData<T> {
    fn from(value: Histogram<T>) -> Self {
        MetricData::Histogram(value)
    }
}

/// The last value recorded for one attribute set.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeDataPoint<T> {
    /// Sorted by key, after view filtering.
    pub attributes: Vec<KeyValue>,
    #[allow(missing_docs)]
    pub value: T,
}

/// Last-value points. Reported the same way for every temporality.
#[derive(Debug, Clone)]
pub struct Gauge<T> {
    #[allow(missing_docs)]
    pub data_points: Vec<GaugeDataPoint<T>>,
    /// Previous collection under delta, provider start otherwise.
    pub start_time: Option<SystemTime>,
    /// When this collection ran.
    pub time: SystemTime,
}

/// The running or interval total for one attribute set.
#[derive(Debug, Clone, PartialEq)]
pub struct SumDataPoint<T> {
    /// Sorted by key, after view filtering.
    pub attributes: Vec<KeyValue>,
    #[allow(missing_docs)]
    pub value: T,
}

/// Sum points.
#[derive(Debug, Clone)]
pub struct Sum<T> {
    #[allow(missing_docs)]
    pub data_points: Vec<SumDataPoint<T>>,
    /// Previous collection under delta, provider start otherwise.
    pub start_time: SystemTime,
    /// When this collection ran.
    pub time: SystemTime,
    /// Delta values cover one interval, cumulative ones everything since
    /// `start_time`.
    pub temporality: Temporality,
    /// `true` for counters, `false` for up-down counters.
    pub is_monotonic: bool,
}

/// Explicit-bucket histogram points.
#[derive(Debug, Clone)]
pub struct Histogram<T> {
    #[allow(missing_docs)]
    pub data_points: Vec<HistogramDataPoint<T>>,
    /// Previous collection under delta, provider start otherwise.
    pub start_time: SystemTime,
    /// When this collection ran.
    pub time: SystemTime,
    #[allow(missing_docs)]
    pub temporality: Temporality,
}

/// Bucketed distribution of one attribute set.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramDataPoint<T> {
    /// Sorted by key, after view filtering.
    pub attributes: Vec<KeyValue>,
    /// Measurements in this point, across all buckets.
    pub count: u64,
    /// Upper bounds, inclusive. `bucket_counts` has one more entry, for the
    /// values above the last bound.
    pub bounds: Vec<f64>,
    #[allow(missing_docs)]
    pub bucket_counts: Vec<u64>,
    /// `None` when the stream disabled `record_min_max`.
    pub min: Option<T>,
    /// `None` when the stream disabled `record_min_max`.
    pub max: Option<T>,
    /// Saturates at the number type's bounds. Zero for instruments that may
    /// record negative values.
    pub sum: T,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_metric_by_scope_and_name() {
        let rm = ResourceMetrics {
            resource: Resource::empty(),
            scope_metrics: vec![ScopeMetrics {
                scope: InstrumentationScope::builder("lib").build(),
                metrics: vec![Metric {
                    name: "requests".into(),
                    description: "".into(),
                    unit: "".into(),
                    data: AggregatedMetrics::U64(MetricData::Sum(Sum {
                        data_points: vec![SumDataPoint {
                            attributes: vec![],
                            value: 3,
                        }],
                        start_time: SystemTime::now(),
                        time: SystemTime::now(),
                        temporality: Temporality::Delta,
                        is_monotonic: true,
                    })),
                }],
            }],
        };
        assert!(rm.find_metric("lib", "requests").is_some());
        assert!(rm.find_metric("other", "requests").is_none());
        assert!(rm.find_metric("lib", "latency").is_none());
    }
}
