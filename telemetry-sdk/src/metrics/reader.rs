//! Interfaces for reading and producing metrics
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use crate::{error::SdkResult, metrics::MetricResult};

use super::{data::ResourceMetrics, pipeline::Pipeline, InstrumentKind, MetricError, Temporality};

/// The interface used between the SDK and an exporter.
///
/// Control flow is bi-directional through the `MetricReader`, since the SDK
/// initiates `force_flush` and `shutdown` while the reader initiates
/// collection. The `register_pipeline` method here informs the metric reader
/// that it can begin reading, signaling the start of bi-directional control
/// flow.
///
/// Typically, push-based exporters that are periodic will implement
/// [`PushMetricExporter`](crate::metrics::exporter::PushMetricExporter)
/// themselves and construct a
/// [`PeriodicReader`](crate::metrics::PeriodicReader) to satisfy this
/// interface.
///
/// Pull-based exporters will typically implement `MetricReader` themselves,
/// since they read on demand.
pub trait MetricReader: fmt::Debug + Send + Sync + 'static {
    /// Registers a [MetricReader] with a [Pipeline].
    ///
    /// The pipeline argument allows the `MetricReader` to signal the sdk to collect
    /// and send aggregated metric measurements.
    fn register_pipeline(&self, pipeline: Weak<Pipeline>);

    /// Gathers and returns all metric data related to the [MetricReader] from the
    /// SDK and stores it in the provided [ResourceMetrics] reference.
    ///
    /// An error is returned if this is called after shutdown, or while another
    /// collection of the same reader is in progress.
    fn collect(&self, rm: &mut ResourceMetrics) -> MetricResult<()>;

    /// Flushes all metric measurements held in an export pipeline.
    ///
    /// There is no guaranteed that all telemetry be flushed or all resources have
    /// been released on error.
    fn force_flush(&self) -> SdkResult;

    /// Flushes all metric measurements held in an export pipeline and releases any
    /// held computational resources.
    ///
    /// After `shutdown` is called, calls to `collect` will perform no operation and
    /// instead will return an error indicating the shutdown state. Calling it
    /// again returns `Ok(())`.
    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult;

    /// Shuts down with a default timeout of 5 seconds.
    fn shutdown(&self) -> SdkResult {
        self.shutdown_with_timeout(Duration::from_secs(5))
    }

    /// The output temporality, a function of instrument kind.
    /// This SHOULD be obtained from the exporter.
    ///
    /// If not configured, the Cumulative temporality SHOULD be used.
    fn temporality(&self, kind: InstrumentKind) -> Temporality;
}

impl<R: MetricReader> MetricReader for Arc<R> {
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        (**self).register_pipeline(pipeline)
    }

    fn collect(&self, rm: &mut ResourceMetrics) -> MetricResult<()> {
        (**self).collect(rm)
    }

    fn force_flush(&self) -> SdkResult {
        (**self).force_flush()
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult {
        (**self).shutdown_with_timeout(timeout)
    }

    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        (**self).temporality(kind)
    }
}

/// Produces metrics for a [MetricReader].
pub(crate) trait SdkProducer: fmt::Debug + Send + Sync {
    /// Returns aggregated metrics from a single collection.
    fn produce(&self, rm: &mut ResourceMetrics) -> MetricResult<()>;
}

/// Held for the length of one collection of a reader.
pub(crate) struct CollectGuard<'a>(&'a AtomicBool);

impl<'a> CollectGuard<'a> {
    /// Fails with [MetricError::CollectInProgress] when a collection is
    /// already running.
    pub(crate) fn acquire(collecting: &'a AtomicBool) -> MetricResult<Self> {
        collecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| CollectGuard(collecting))
            .map_err(|_| MetricError::CollectInProgress)
    }
}

impl Drop for CollectGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_guard_is_rejected_until_first_is_dropped() {
        let collecting = AtomicBool::new(false);
        let guard = CollectGuard::acquire(&collecting).unwrap();
        assert!(matches!(
            CollectGuard::acquire(&collecting),
            Err(MetricError::CollectInProgress)
        ));
        drop(guard);
        assert!(CollectGuard::acquire(&collecting).is_ok());
    }
}
