use std::{
    fmt,
    sync::{atomic::AtomicBool, Arc, Mutex, Weak},
    time::Duration,
};

use telemetry::diag_warn;

use crate::{
    error::SdkResult,
    metrics::{MetricError, MetricResult},
};

use super::{
    data::{ResourceMetrics, Temporality},
    instrument::InstrumentKind,
    pipeline::Pipeline,
    reader::{CollectGuard, MetricReader, SdkProducer},
};

/// A simple [MetricReader] that allows an application to read metrics on demand.
///
/// Clones share state, so a clone kept by the application can collect from a
/// reader handed to the provider.
///
/// See [ManualReaderBuilder] for configuration options.
///
/// # Example
///
/// ```
/// use telemetry_sdk::metrics::ManualReader;
///
/// // can specify additional reader configuration
/// let reader = ManualReader::builder().build();
/// # drop(reader)
/// ```
#[derive(Clone)]
pub struct ManualReader {
    inner: Arc<Mutex<ManualReaderInner>>,
    collecting: Arc<AtomicBool>,
    temporality: Temporality,
}

impl Default for ManualReader {
    fn default() -> Self {
        ManualReader::builder().build()
    }
}

impl fmt::Debug for ManualReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ManualReader")
    }
}

#[derive(Debug, Default)]
struct ManualReaderInner {
    sdk_producer: Option<Weak<dyn SdkProducer>>,
    is_shutdown: bool,
}

impl ManualReader {
    /// Configuration for this reader
    pub fn builder() -> ManualReaderBuilder {
        ManualReaderBuilder::default()
    }

    /// A [MetricReader] which is directly called to collect metrics.
    pub(crate) fn new(temporality: Temporality) -> Self {
        ManualReader {
            inner: Arc::new(Mutex::new(ManualReaderInner::default())),
            collecting: Arc::new(AtomicBool::new(false)),
            temporality,
        }
    }
}

impl MetricReader for ManualReader {
    ///  Register a pipeline which enables the caller to read metrics from the SDK
    ///  on demand.
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        let _ = self.inner.lock().map(|mut inner| {
            // Only register once. If producer is already set, do nothing.
            if inner.sdk_producer.is_none() {
                inner.sdk_producer = Some(pipeline);
            } else {
                diag_warn!(
                    name: "ManualReader.DuplicateRegistration",
                    message = "The pipeline is already registered to the Reader. Registering pipeline multiple times is not allowed."
                );
            }
        });
    }

    /// Gathers all metrics from the SDK, calling any callbacks necessary and
    /// returning the results.
    ///
    /// Returns an error if called after shutdown or while another collection
    /// is running.
    fn collect(&self, rm: &mut ResourceMetrics) -> MetricResult<()> {
        let _guard = CollectGuard::acquire(&self.collecting)?;

        let producer = {
            let inner = self.inner.lock()?;
            if inner.is_shutdown {
                return Err(MetricError::Shutdown);
            }
            inner.sdk_producer.as_ref().and_then(|w| w.upgrade())
        };

        match producer {
            Some(producer) => producer.produce(rm),
            None => Err(MetricError::Other(
                "reader is not registered with a meter provider".into(),
            )),
        }
    }

    /// ForceFlush is a no-op, it always returns Ok.
    fn force_flush(&self) -> SdkResult {
        Ok(())
    }

    /// Closes any connections and frees any resources used by the reader.
    fn shutdown_with_timeout(&self, _timeout: Duration) -> SdkResult {
        let mut inner = self.inner.lock()?;

        // Any future call to collect will now return an error.
        inner.sdk_producer = None;
        inner.is_shutdown = true;

        Ok(())
    }

    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        kind.temporality_preference(self.temporality)
    }
}

/// Configuration for a [ManualReader]
#[derive(Default)]
pub struct ManualReaderBuilder {
    temporality: Temporality,
}

impl fmt::Debug for ManualReaderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ManualReaderBuilder")
    }
}

impl ManualReaderBuilder {
    /// New manual builder configuration
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the [Temporality] of the exporter.
    pub fn with_temporality(mut self, temporality: Temporality) -> Self {
        self.temporality = temporality;
        self
    }

    /// Create a new [ManualReader] from this configuration.
    pub fn build(self) -> ManualReader {
        ManualReader::new(self.temporality)
    }
}
