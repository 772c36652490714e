//! Interfaces for exporting metrics
use std::{future::Future, time::Duration};

use futures_util::future::BoxFuture;

use crate::error::SdkResult;

use super::{data::ResourceMetrics, Temporality};

/// Exporter handles the delivery of metric data to external receivers.
///
/// This is the final component in the metric push pipeline.
pub trait PushMetricExporter: Send + Sync + 'static {
    /// Export serializes and transmits metric data to a receiver.
    ///
    /// All retry logic must be contained in this function. The SDK does not
    /// implement any retry logic. All errors returned by this function are
    /// considered unrecoverable and will be logged.
    fn export(&self, metrics: &ResourceMetrics) -> impl Future<Output = SdkResult> + Send;

    /// Flushes any metric data held by an exporter.
    fn force_flush(&self) -> SdkResult;

    /// Releases any held computational resources.
    ///
    /// After Shutdown is called, calls to Export will perform no operation and
    /// instead will return an error indicating the shutdown state. Repeated
    /// calls return `Ok(())`.
    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult;

    /// Shutdown with the default timeout of 5 seconds.
    fn shutdown(&self) -> SdkResult {
        self.shutdown_with_timeout(Duration::from_secs(5))
    }

    /// Access the [Temporality] of the MetricExporter.
    fn temporality(&self) -> Temporality;
}

/// Object safe view of a [PushMetricExporter], so one reader can hold
/// exporters of different types.
pub(crate) trait ErasedExporter: Send + Sync + 'static {
    fn export<'a>(&'a self, metrics: &'a ResourceMetrics) -> BoxFuture<'a, SdkResult>;

    fn force_flush(&self) -> SdkResult;

    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult;

    fn temporality(&self) -> Temporality;
}

impl<E: PushMetricExporter> ErasedExporter for E {
    fn export<'a>(&'a self, metrics: &'a ResourceMetrics) -> BoxFuture<'a, SdkResult> {
        Box::pin(PushMetricExporter::export(self, metrics))
    }

    fn force_flush(&self) -> SdkResult {
        PushMetricExporter::force_flush(self)
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult {
        PushMetricExporter::shutdown_with_timeout(self, timeout)
    }

    fn temporality(&self) -> Temporality {
        PushMetricExporter::temporality(self)
    }
}
