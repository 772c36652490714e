//! End-to-end metrics pipelines built only from the public API.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rstest::rstest;
use telemetry::metrics::MeterProvider;
use telemetry::{Key, KeyValue, Value};
use telemetry_sdk::error::{SdkError, SdkResult};
use telemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics, Sum};
use telemetry_sdk::metrics::{
    new_view, Instrument, ManualReader, MetricError, MetricReader, PeriodicReader,
    PushMetricExporter, SdkMeterProvider, Stream, Temporality,
};
use telemetry_sdk::Resource;

/// Keeps every exported collection and counts shutdowns.
#[derive(Debug, Clone, Default)]
struct RecordingExporter {
    exports: Arc<Mutex<Vec<ResourceMetrics>>>,
    shutdowns: Arc<Mutex<usize>>,
}

impl PushMetricExporter for RecordingExporter {
    async fn export(&self, metrics: &ResourceMetrics) -> SdkResult {
        self.exports.lock()?.push(metrics.clone());
        Ok(())
    }

    fn force_flush(&self) -> SdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult {
        *self.shutdowns.lock()? += 1;
        Ok(())
    }

    fn temporality(&self) -> Temporality {
        Temporality::Cumulative
    }
}

fn u64_sum(rm: &ResourceMetrics, scope: &str, name: &str) -> Option<Sum<u64>> {
    match &rm.find_metric(scope, name)?.data {
        AggregatedMetrics::U64(MetricData::Sum(sum)) => Some(sum.clone()),
        other => panic!("unexpected data for {name}: {other:?}"),
    }
}

#[rstest]
#[case(Temporality::Cumulative, vec![1, 3, 6])]
#[case(Temporality::Delta, vec![1, 2, 3])]
fn counter_totals_follow_reader_temporality(
    #[case] temporality: Temporality,
    #[case] expected: Vec<u64>,
) {
    let reader = ManualReader::builder().with_temporality(temporality).build();
    let provider = SdkMeterProvider::builder()
        .with_reader(reader.clone())
        .build();
    let counter = provider.meter("integration").u64_counter("ticks").build();

    let mut rm = ResourceMetrics::default();
    let mut totals = Vec::new();
    for v in [1, 2, 3] {
        counter.add(v, &[KeyValue::new("kind", "tick")]);
        reader.collect(&mut rm).unwrap();
        let sum = u64_sum(&rm, "integration", "ticks").unwrap();
        assert_eq!(sum.temporality, temporality);
        totals.push(sum.data_points[0].value);
    }
    assert_eq!(totals, expected);
    provider.shutdown().unwrap();
}

#[test]
fn periodic_reader_exports_resource_and_shuts_down_once() {
    let exporter = RecordingExporter::default();
    let provider = SdkMeterProvider::builder()
        .with_resource(Resource::builder_empty().with_service_name("checkout").build())
        .with_reader(
            PeriodicReader::builder(exporter.clone())
                .with_interval(Duration::from_secs(3600))
                .build(),
        )
        .build();

    let counter = provider.meter("integration").u64_counter("orders").build();
    counter.add(4, &[]);
    provider.force_flush().unwrap();

    {
        let exports = exporter.exports.lock().unwrap();
        assert_eq!(exports.len(), 1);
        assert_eq!(
            exports[0].resource.get(&Key::new("service.name")),
            Some(Value::from("checkout"))
        );
        let sum = u64_sum(&exports[0], "integration", "orders").unwrap();
        assert_eq!(sum.data_points[0].value, 4);
    }

    provider.shutdown().unwrap();
    provider.shutdown().unwrap();
    assert_eq!(*exporter.shutdowns.lock().unwrap(), 1);
}

#[test]
fn reader_added_later_sees_existing_instruments() {
    let provider = SdkMeterProvider::builder().build();
    let counter = provider.meter("integration").u64_counter("early").build();
    counter.add(1, &[]);

    let reader = ManualReader::builder().build();
    provider.add_reader(reader.clone());
    counter.add(2, &[]);

    let mut rm = ResourceMetrics::default();
    reader.collect(&mut rm).unwrap();
    let sum = u64_sum(&rm, "integration", "early").expect("instrument is bound to the new reader");
    assert_eq!(sum.data_points[0].value, 2);
}

#[test]
fn views_rename_and_filter_streams() {
    let view = new_view(
        Instrument::new().name("http.requests"),
        Stream::builder()
            .with_name("requests_by_route")
            .with_allowed_attribute_keys([Key::new("route")])
            .build()
            .unwrap(),
    )
    .unwrap();
    let reader = ManualReader::builder().build();
    let provider = SdkMeterProvider::builder()
        .with_reader(reader.clone())
        .with_view(view)
        .build();

    let counter = provider.meter("integration").u64_counter("http.requests").build();
    counter.add(1, &[KeyValue::new("route", "/a"), KeyValue::new("peer", "1")]);
    counter.add(1, &[KeyValue::new("route", "/a"), KeyValue::new("peer", "2")]);
    counter.add(1, &[KeyValue::new("route", "/b")]);

    let mut rm = ResourceMetrics::default();
    reader.collect(&mut rm).unwrap();
    assert!(rm.find_metric("integration", "http.requests").is_none());
    let sum = u64_sum(&rm, "integration", "requests_by_route").unwrap();
    let mut points: Vec<(String, u64)> = sum
        .data_points
        .iter()
        .map(|dp| (dp.attributes[0].value.to_string(), dp.value))
        .collect();
    points.sort();
    assert_eq!(points, vec![("/a".to_string(), 2), ("/b".to_string(), 1)]);
}

#[test]
fn collect_after_shutdown_is_rejected() {
    let reader = ManualReader::builder().build();
    let provider = SdkMeterProvider::builder()
        .with_reader(reader.clone())
        .build();
    provider.shutdown().unwrap();

    let mut rm = ResourceMetrics::default();
    assert!(matches!(reader.collect(&mut rm), Err(MetricError::Shutdown)));
    assert!(provider.force_flush().is_ok());

    // instruments from a shut down provider record nothing
    let counter = provider.meter("integration").u64_counter("late").build();
    counter.add(1, &[]);
}

#[derive(Debug, Clone, Default)]
struct RejectingExporter;

impl PushMetricExporter for RejectingExporter {
    async fn export(&self, _metrics: &ResourceMetrics) -> SdkResult {
        Err(SdkError::ExportFailed("backend unavailable".into()))
    }

    fn force_flush(&self) -> SdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult {
        Ok(())
    }

    fn temporality(&self) -> Temporality {
        Temporality::Cumulative
    }
}

#[test]
fn failing_reader_does_not_hide_healthy_one() {
    let healthy = RecordingExporter::default();
    let provider = SdkMeterProvider::builder()
        .with_periodic_exporter(RejectingExporter)
        .with_periodic_exporter(healthy.clone())
        .build();
    provider
        .meter("integration")
        .u64_counter("jobs")
        .build()
        .add(1, &[]);

    assert!(provider.force_flush().is_err());
    assert_eq!(healthy.exports.lock().unwrap().len(), 1);
}
