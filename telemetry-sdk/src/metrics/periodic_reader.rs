use std::{
    env, fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender},
        Arc, Mutex, Weak,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use telemetry::{diag_debug, diag_error, diag_info, diag_warn};

use crate::{
    error::{combine_results, SdkError, SdkResult},
    metrics::{
        exporter::{ErasedExporter, PushMetricExporter},
        reader::{CollectGuard, SdkProducer},
        MetricError, MetricResult,
    },
};

use super::{
    data::{ResourceMetrics, Temporality},
    instrument::InstrumentKind,
    reader::MetricReader,
    Pipeline,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

const METRIC_EXPORT_INTERVAL_NAME: &str = "OTEL_METRIC_EXPORT_INTERVAL";
const METRIC_EXPORT_TIMEOUT_NAME: &str = "OTEL_METRIC_EXPORT_TIMEOUT";

// Pending flush and shutdown requests before senders block.
const CONTROL_CHANNEL_CAPACITY: usize = 64;

/// Configuration options for [PeriodicReader].
///
/// A periodic reader is a [MetricReader] that collects and exports metric data
/// to its exporters at a defined interval.
///
/// By default, the returned [MetricReader] will collect and export data every
/// 60 seconds. The export time is not counted towards the interval between
/// attempts. The timeout bounds how long `force_flush` and `shutdown` wait
/// for the worker.
///
/// The [collect] method of the returned [MetricReader] continues to gather and
/// return metric data to the user. It will not automatically send that data to
/// the exporters outside of the predefined interval.
///
/// [collect]: MetricReader::collect
pub struct PeriodicReaderBuilder {
    interval: Duration,
    timeout: Duration,
    exporters: Vec<Box<dyn ErasedExporter>>,
}

impl fmt::Debug for PeriodicReaderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicReaderBuilder")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("exporters", &self.exporters.len())
            .finish()
    }
}

fn duration_from_env(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().map(Duration::from_millis).ok())
        .unwrap_or(default)
}

impl PeriodicReaderBuilder {
    fn new<E: PushMetricExporter>(exporter: E) -> Self {
        PeriodicReaderBuilder {
            interval: duration_from_env(METRIC_EXPORT_INTERVAL_NAME, DEFAULT_INTERVAL),
            timeout: duration_from_env(METRIC_EXPORT_TIMEOUT_NAME, DEFAULT_TIMEOUT),
            exporters: vec![Box::new(exporter)],
        }
    }

    /// Adds another exporter. Every collection is exported to all exporters,
    /// in the order they were added.
    ///
    /// Exporters are expected to agree on temporality. Otherwise a warning is
    /// logged and the temporality of the first exporter is used.
    pub fn with_exporter<E: PushMetricExporter>(mut self, exporter: E) -> Self {
        self.exporters.push(Box::new(exporter));
        self
    }

    /// Configures the intervening time between exports for a [PeriodicReader].
    ///
    /// This option overrides any value set for the `OTEL_METRIC_EXPORT_INTERVAL`
    /// environment variable.
    ///
    /// If this option is not used or `interval` is equal to zero, 60 seconds is
    /// used as the default.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.interval = interval;
        }
        self
    }

    /// Configures how long `force_flush` and `shutdown` wait for the export
    /// to complete.
    ///
    /// This option overrides any value set for the `OTEL_METRIC_EXPORT_TIMEOUT`
    /// environment variable.
    ///
    /// If this option is not used or `timeout` is equal to zero, 30 seconds is used
    /// as the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    /// Create a [PeriodicReader] with the given config.
    pub fn build(self) -> PeriodicReader {
        PeriodicReader::new(self.exporters, self.interval, self.timeout)
    }
}

/// A [MetricReader] that continuously collects and exports metric data at a set
/// interval.
///
/// A dedicated thread, named `PeriodicReader`, performs the exports. Flush
/// requests are queued to that thread, so exports of one reader never overlap.
///
/// By default, PeriodicReader will collect and export data every
/// 60 seconds. The export time is not counted towards the interval between
/// attempts.
///
/// The [collect] method of the returned continues to gather and
/// return metric data to the user. It will not automatically send that data to
/// the exporters outside of the predefined interval.
///
/// [collect]: MetricReader::collect
///
/// # Example
///
/// ```no_run
/// use telemetry_sdk::metrics::PeriodicReader;
/// # fn example<E>(get_exporter: impl Fn() -> E)
/// # where
/// #     E: telemetry_sdk::metrics::PushMetricExporter,
/// # {
///
/// let exporter = get_exporter(); // set up a push exporter
///
/// let reader = PeriodicReader::builder(exporter).build();
/// # drop(reader);
/// # }
/// ```
#[derive(Clone)]
pub struct PeriodicReader {
    inner: Arc<PeriodicReaderInner>,
}

impl PeriodicReader {
    /// Configuration options for a periodic reader with the first exporter.
    pub fn builder<E>(exporter: E) -> PeriodicReaderBuilder
    where
        E: PushMetricExporter,
    {
        PeriodicReaderBuilder::new(exporter)
    }

    fn new(exporters: Vec<Box<dyn ErasedExporter>>, interval: Duration, timeout: Duration) -> Self {
        let temporality = exporters
            .first()
            .map(|e| e.temporality())
            .unwrap_or_default();
        if exporters.iter().any(|e| e.temporality() != temporality) {
            diag_warn!(
                name: "PeriodicReader.TemporalityMismatch",
                message = "exporters of one reader prefer different temporalities, using the one of the first exporter",
                temporality = format!("{temporality:?}")
            );
        }

        let (message_sender, message_receiver) = mpsc::sync_channel(CONTROL_CHANNEL_CAPACITY);
        let inner = Arc::new(PeriodicReaderInner {
            exporters,
            temporality,
            message_sender,
            producer: Mutex::new(None),
            is_shutdown: AtomicBool::new(false),
            collecting: AtomicBool::new(false),
            handle: Mutex::new(None),
            timeout,
        });

        let worker_inner = Arc::downgrade(&inner);
        let result_thread_creation = thread::Builder::new()
            .name("PeriodicReader".to_string())
            .spawn(move || run_worker(worker_inner, message_receiver, interval, timeout));

        match result_thread_creation {
            Ok(handle) => {
                if let Ok(mut slot) = inner.handle.lock() {
                    *slot = Some(handle);
                }
            }
            Err(err) => diag_error!(
                name: "PeriodicReader.ThreadStartFailed",
                message = "metrics will not be exported periodically",
                error = err.to_string()
            ),
        }

        PeriodicReader { inner }
    }
}

fn run_worker(
    reader: Weak<PeriodicReaderInner>,
    receiver: Receiver<Message>,
    interval: Duration,
    timeout: Duration,
) {
    let mut interval_start = Instant::now();
    let mut remaining_interval = interval;
    diag_info!(
        name: "PeriodicReader.ThreadStarted",
        interval_in_millisecs = interval.as_millis() as u64,
        timeout_in_millisecs = timeout.as_millis() as u64
    );
    loop {
        match receiver.recv_timeout(remaining_interval) {
            Ok(Message::Flush(response_sender)) => {
                diag_debug!(name: "PeriodicReader.ExportingDueToFlush");
                let Some(inner) = reader.upgrade() else {
                    break;
                };
                let result = combine_results(vec![inner.collect_and_export(), inner.flush_exporters()]);
                let _ = response_sender.send(result);

                // Adjust the remaining interval after the flush
                let elapsed = interval_start.elapsed();
                if elapsed < interval {
                    remaining_interval = interval - elapsed;
                } else {
                    // The flush ran past the scheduled export, which happens
                    // right away.
                    interval_start = Instant::now();
                    remaining_interval = Duration::ZERO;
                }
            }
            Ok(Message::Shutdown(response_sender)) => {
                // Perform final export and break out of loop and exit the thread
                diag_debug!(name: "PeriodicReader.ExportingDueToShutdown");
                let result = match reader.upgrade() {
                    Some(inner) => combine_results(vec![
                        inner.collect_and_export(),
                        inner.shutdown_exporters(timeout),
                    ]),
                    None => Ok(()),
                };
                let _ = response_sender.send(result);
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                let export_start = Instant::now();
                diag_debug!(name: "PeriodicReader.ExportingDueToTimer");
                let Some(inner) = reader.upgrade() else {
                    break;
                };
                let _ = inner.collect_and_export();
                drop(inner);

                let time_taken_for_export = export_start.elapsed();
                interval_start = Instant::now();
                remaining_interval = interval.saturating_sub(time_taken_for_export);
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    diag_info!(name: "PeriodicReader.ThreadStopped");
}

impl fmt::Debug for PeriodicReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicReader")
            .field("exporters", &self.inner.exporters.len())
            .field("temporality", &self.inner.temporality)
            .finish()
    }
}

struct PeriodicReaderInner {
    exporters: Vec<Box<dyn ErasedExporter>>,
    temporality: Temporality,
    message_sender: SyncSender<Message>,
    producer: Mutex<Option<Weak<dyn SdkProducer>>>,
    is_shutdown: AtomicBool,
    collecting: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

impl PeriodicReaderInner {
    fn register_pipeline(&self, producer: Weak<dyn SdkProducer>) {
        match self.producer.lock() {
            Ok(mut inner) => *inner = Some(producer),
            Err(err) => diag_error!(
                name: "PeriodicReader.RegisterPipelineFailed",
                error = err.to_string()
            ),
        }
    }

    fn collect(&self, rm: &mut ResourceMetrics) -> MetricResult<()> {
        let _guard = CollectGuard::acquire(&self.collecting)?;
        let producer = self
            .producer
            .lock()?
            .as_ref()
            .and_then(|p| p.upgrade());
        match producer {
            Some(p) => p.produce(rm),
            None => Err(MetricError::Other(
                "reader is not registered with a meter provider".into(),
            )),
        }
    }

    /// Collects once and hands the batch to every exporter. A failing
    /// exporter does not keep the others from receiving the batch.
    fn collect_and_export(&self) -> SdkResult {
        let mut rm = ResourceMetrics::default();
        if let Err(err) = self.collect(&mut rm) {
            diag_warn!(
                name: "PeriodicReader.CollectFailed",
                error = err.to_string()
            );
            return Err(err.into());
        }

        if rm.scope_metrics.is_empty() {
            diag_debug!(name: "PeriodicReader.NoMetricsCollected");
            return Ok(());
        }

        let results = self
            .exporters
            .iter()
            .enumerate()
            .map(|(index, exporter)| {
                // Relying on futures executor to execute async call.
                let result = futures_executor::block_on(exporter.export(&rm));
                if let Err(err) = &result {
                    diag_error!(
                        name: "PeriodicReader.ExportFailed",
                        exporter = index,
                        error = err.to_string()
                    );
                }
                result
            })
            .collect();
        combine_results(results)
    }

    fn flush_exporters(&self) -> SdkResult {
        combine_results(self.exporters.iter().map(|e| e.force_flush()).collect())
    }

    fn shutdown_exporters(&self, timeout: Duration) -> SdkResult {
        combine_results(
            self.exporters
                .iter()
                .map(|e| e.shutdown_with_timeout(timeout))
                .collect(),
        )
    }

    fn force_flush(&self) -> SdkResult {
        if self.is_shutdown.load(Ordering::Relaxed) {
            return Ok(());
        }
        let (response_tx, response_rx) = mpsc::sync_channel(1);
        self.message_sender
            .send(Message::Flush(response_tx))
            .map_err(|e| SdkError::InternalFailure(format!("PeriodicReader worker is gone: {e}")))?;

        match response_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(SdkError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(SdkError::InternalFailure(
                "PeriodicReader worker exited during flush".into(),
            )),
        }
    }

    fn shutdown(&self, timeout: Duration) -> SdkResult {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (response_tx, response_rx) = mpsc::sync_channel(1);
        if self.message_sender.send(Message::Shutdown(response_tx)).is_err() {
            // No worker to do it.
            return self.shutdown_exporters(timeout);
        }

        let result = match response_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                diag_error!(
                    name: "PeriodicReader.ShutdownTimedOut",
                    timeout_in_millisecs = timeout.as_millis() as u64
                );
                return Err(SdkError::Timeout(timeout));
            }
            Err(RecvTimeoutError::Disconnected) => Err(SdkError::InternalFailure(
                "PeriodicReader worker exited during shutdown".into(),
            )),
        };

        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
        result
    }
}

#[derive(Debug)]
enum Message {
    Flush(SyncSender<SdkResult>),
    Shutdown(SyncSender<SdkResult>),
}

impl MetricReader for PeriodicReader {
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        self.inner.register_pipeline(pipeline);
    }

    fn collect(&self, rm: &mut ResourceMetrics) -> MetricResult<()> {
        if self.inner.is_shutdown.load(Ordering::Relaxed) {
            return Err(MetricError::Shutdown);
        }
        self.inner.collect(rm)
    }

    /// Exports right away, queued behind any export already in progress.
    /// Returns `Ok(())` after shutdown.
    fn force_flush(&self) -> SdkResult {
        self.inner.force_flush()
    }

    fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult {
        self.inner.shutdown(timeout)
    }

    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        kind.temporality_preference(self.inner.temporality)
    }
}
