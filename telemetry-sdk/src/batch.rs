//! The background worker behind the batch span and log processors.
//!
//! Records travel over a bounded data channel, control messages over a
//! second, smaller one. A single thread drains the data channel in batches
//! of at most `max_export_batch_size` when the batch size is reached, when
//! `scheduled_delay` elapses, or when asked to by `force_flush` or
//! `shutdown`.

use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use telemetry::{diag_debug, diag_error, diag_warn};

use crate::error::{combine_results, SdkError, SdkResult};
use crate::Resource;

const CONTROL_CHANNEL_CAPACITY: usize = 64;

const ACTIVE: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const SHUTDOWN: u8 = 2;

/// Reads a numeric environment variable, ignoring unparsable values.
pub(crate) fn env_value<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| T::from_str(v.trim()).ok())
}

/// Returns `(max_queue_size, max_export_batch_size)` with both at least one
/// and the batch no larger than the queue.
pub(crate) fn clamp_sizes(max_queue_size: usize, max_export_batch_size: usize) -> (usize, usize) {
    if max_queue_size == 0 {
        diag_warn!(
            name: "BatchProcessor.InvalidMaxQueueSize",
            message = "max_queue_size of 0 raised to 1"
        );
    }
    if max_export_batch_size == 0 {
        diag_warn!(
            name: "BatchProcessor.InvalidMaxExportBatchSize",
            message = "max_export_batch_size of 0 raised to 1"
        );
    }
    let max_queue_size = max_queue_size.max(1);
    (max_queue_size, max_export_batch_size.clamp(1, max_queue_size))
}

/// Receives the batches drained by a [`BatchWorker`], on the worker thread.
pub(crate) trait BatchSink<R>: Send + 'static {
    /// Exports `batch`. The worker clears it afterwards.
    fn export(&mut self, batch: &mut Vec<R>) -> SdkResult;

    fn force_flush(&mut self) -> SdkResult;

    fn shutdown(&mut self, timeout: Duration) -> SdkResult;

    fn set_resource(&mut self, resource: &Resource);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WorkerConfig {
    pub(crate) max_queue_size: usize,
    pub(crate) max_export_batch_size: usize,
    pub(crate) scheduled_delay: Duration,
    pub(crate) max_export_timeout: Duration,
}

#[derive(Debug)]
enum Control {
    /// Sent once the pending records reach `max_export_batch_size`.
    ExportBatch,
    /// Export every record up to the `target`-th accepted one.
    Flush {
        target: usize,
        reply: SyncSender<SdkResult>,
    },
    Shutdown {
        timeout: Duration,
        reply: SyncSender<SdkResult>,
    },
    SetResource(Arc<Resource>),
}

#[derive(Debug, Default)]
struct Counters {
    /// Records handed to the data channel over the worker's lifetime.
    accepted: AtomicUsize,
    /// Records in the data channel. Raised before a send, so it never
    /// undercounts.
    pending: AtomicUsize,
    dropped: AtomicUsize,
    export_failures: AtomicUsize,
}

/// Handle to a batching worker thread exporting records of type `R`.
#[derive(Debug)]
pub(crate) struct BatchWorker<R> {
    name: &'static str,
    records: SyncSender<R>,
    control: SyncSender<Control>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state: AtomicU8,
    export_requested: Arc<AtomicBool>,
    counters: Arc<Counters>,
    config: WorkerConfig,
}

impl<R: Send + 'static> BatchWorker<R> {
    /// Starts the worker thread, named `name`.
    pub(crate) fn new<S: BatchSink<R>>(name: &'static str, sink: S, config: WorkerConfig) -> Self {
        let (records, records_rx) = mpsc::sync_channel(config.max_queue_size);
        let (control, control_rx) = mpsc::sync_channel(CONTROL_CHANNEL_CAPACITY);
        let counters = Arc::new(Counters::default());
        let export_requested = Arc::new(AtomicBool::new(false));

        let drain = Drain {
            name,
            sink,
            records: records_rx,
            batch: Vec::with_capacity(config.max_export_batch_size),
            dequeued: 0,
            counters: Arc::clone(&counters),
            config,
        };
        let worker_export_requested = Arc::clone(&export_requested);
        let handle = match thread::Builder::new()
            .name(name.to_string())
            .spawn(move || drain.run(control_rx, worker_export_requested))
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                diag_error!(
                    name: "BatchProcessor.ThreadStartFailed",
                    processor = name,
                    message = "records will be dropped",
                    error = err.to_string()
                );
                None
            }
        };

        BatchWorker {
            name,
            records,
            control,
            handle: Mutex::new(handle),
            state: AtomicU8::new(ACTIVE),
            export_requested,
            counters,
            config,
        }
    }

    /// Queues `record` without blocking. A full queue drops it.
    pub(crate) fn submit(&self, record: R) {
        if self.state.load(Ordering::Acquire) != ACTIVE {
            return;
        }

        let pending = self.counters.pending.fetch_add(1, Ordering::AcqRel) + 1;
        match self.records.try_send(record) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::AcqRel);
                if pending >= self.config.max_export_batch_size
                    && !self.export_requested.load(Ordering::Relaxed)
                    && !self.export_requested.swap(true, Ordering::Relaxed)
                    && self.control.try_send(Control::ExportBatch).is_err()
                {
                    self.export_requested.store(false, Ordering::Relaxed);
                }
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.counters.pending.fetch_sub(1, Ordering::AcqRel);
                // Only the first drop is reported here, shutdown reports the total.
                if self.counters.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                    diag_warn!(
                        name: "BatchProcessor.RecordDroppingStarted",
                        processor = self.name,
                        message = "a record was dropped because the queue is full, further drops are reported at shutdown"
                    );
                }
            }
        }
    }

    /// Exports every record accepted before this call, waiting at most
    /// `timeout`. On timeout the export carries on in the background.
    pub(crate) fn force_flush_with_timeout(&self, timeout: Duration) -> SdkResult {
        if self.state.load(Ordering::Acquire) != ACTIVE {
            return Ok(());
        }
        let target = self.counters.accepted.load(Ordering::Acquire);

        if timeout.is_zero() {
            if self.counters.pending.load(Ordering::Acquire) == 0 {
                return Ok(());
            }
            let (reply, _) = mpsc::sync_channel(1);
            let _ = self.control.try_send(Control::Flush { target, reply });
            return Err(SdkError::Timeout(timeout));
        }

        let (reply, response) = mpsc::sync_channel(1);
        match self.control.try_send(Control::Flush { target, reply }) {
            Ok(()) => match response.recv_timeout(timeout) {
                Ok(result) => result,
                Err(RecvTimeoutError::Timeout) => Err(SdkError::Timeout(timeout)),
                Err(RecvTimeoutError::Disconnected) => Err(SdkError::InternalFailure(format!(
                    "{} worker exited during flush",
                    self.name
                ))),
            },
            Err(TrySendError::Full(_)) => {
                diag_debug!(
                    name: "BatchProcessor.ForceFlush.ControlChannelFull",
                    processor = self.name
                );
                Err(SdkError::InternalFailure(format!(
                    "{} control channel is full",
                    self.name
                )))
            }
            Err(TrySendError::Disconnected(_)) => Err(SdkError::InternalFailure(format!(
                "{} worker is not running",
                self.name
            ))),
        }
    }

    pub(crate) fn force_flush(&self) -> SdkResult {
        self.force_flush_with_timeout(self.config.max_export_timeout)
    }

    /// Exports everything queued, shuts the exporter down and joins the
    /// worker. Later calls return `Ok(())` and do nothing.
    pub(crate) fn shutdown_with_timeout(&self, timeout: Duration) -> SdkResult {
        if self
            .state
            .compare_exchange(ACTIVE, SHUTTING_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            diag_debug!(name: "BatchProcessor.AlreadyShutdown", processor = self.name);
            return Ok(());
        }

        let dropped = self.counters.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            diag_warn!(
                name: "BatchProcessor.DroppedRecords",
                processor = self.name,
                dropped_count = dropped,
                max_queue_size = self.config.max_queue_size,
                message = "records were dropped because the queue was full, consider a larger queue or a shorter delay"
            );
        }

        let (reply, response) = mpsc::sync_channel(1);
        let result = match self.control.try_send(Control::Shutdown { timeout, reply }) {
            Ok(()) => match response.recv_timeout(timeout) {
                Ok(result) => {
                    self.join_worker();
                    result
                }
                Err(RecvTimeoutError::Timeout) => {
                    diag_error!(
                        name: "BatchProcessor.Shutdown.Timeout",
                        processor = self.name
                    );
                    Err(SdkError::Timeout(timeout))
                }
                Err(RecvTimeoutError::Disconnected) => Err(SdkError::InternalFailure(format!(
                    "{} worker exited during shutdown",
                    self.name
                ))),
            },
            Err(TrySendError::Full(_)) => Err(SdkError::InternalFailure(format!(
                "{} control channel is full",
                self.name
            ))),
            // The worker never started, so nothing was queued.
            Err(TrySendError::Disconnected(_)) => Ok(()),
        };
        self.state.store(SHUTDOWN, Ordering::Release);
        result
    }

    pub(crate) fn shutdown(&self) -> SdkResult {
        self.shutdown_with_timeout(self.config.max_export_timeout)
    }

    pub(crate) fn set_resource(&self, resource: &Resource) {
        let _ = self
            .control
            .try_send(Control::SetResource(Arc::new(resource.clone())));
    }

    pub(crate) fn dropped_count(&self) -> usize {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn export_failures(&self) -> usize {
        self.counters.export_failures.load(Ordering::Relaxed)
    }

    fn join_worker(&self) {
        let handle = self.handle.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// Worker thread state.
struct Drain<R, S> {
    name: &'static str,
    sink: S,
    records: Receiver<R>,
    batch: Vec<R>,
    dequeued: usize,
    counters: Arc<Counters>,
    config: WorkerConfig,
}

impl<R, S: BatchSink<R>> Drain<R, S> {
    fn run(mut self, control: Receiver<Control>, export_requested: Arc<AtomicBool>) {
        diag_debug!(
            name: "BatchProcessor.ThreadStarted",
            processor = self.name,
            interval_in_millisecs = self.config.scheduled_delay.as_millis() as u64,
            max_export_batch_size = self.config.max_export_batch_size,
            max_queue_size = self.config.max_queue_size
        );
        let mut last_export_time = Instant::now();

        loop {
            let remaining_time = self
                .config
                .scheduled_delay
                .saturating_sub(last_export_time.elapsed());

            match control.recv_timeout(remaining_time) {
                Ok(Control::ExportBatch) => {
                    // Reset the flag now that the message has been processed.
                    export_requested.store(false, Ordering::Relaxed);
                    diag_debug!(name: "BatchProcessor.ExportingDueToBatchSize", processor = self.name);
                    let _ = self.export_pending();
                    last_export_time = Instant::now();
                }
                Ok(Control::Flush { target, reply }) => {
                    diag_debug!(name: "BatchProcessor.ExportingDueToForceFlush", processor = self.name);
                    let exported = self.export_until(target);
                    let result = combine_results(vec![exported, self.sink.force_flush()]);
                    let _ = reply.send(result);
                    last_export_time = Instant::now();
                }
                Ok(Control::Shutdown { timeout, reply }) => {
                    diag_debug!(name: "BatchProcessor.ExportingDueToShutdown", processor = self.name);
                    let exported = self.export_until(usize::MAX);
                    let result = combine_results(vec![exported, self.sink.shutdown(timeout)]);
                    let _ = reply.send(result);
                    break;
                }
                Ok(Control::SetResource(resource)) => {
                    self.sink.set_resource(&resource);
                }
                Err(RecvTimeoutError::Timeout) => {
                    diag_debug!(name: "BatchProcessor.ExportingDueToTimer", processor = self.name);
                    let _ = self.export_pending();
                    last_export_time = Instant::now();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // The processor was dropped without shutdown.
                    break;
                }
            }
        }
        diag_debug!(name: "BatchProcessor.ThreadStopped", processor = self.name);
    }

    fn export_pending(&mut self) -> SdkResult {
        let target = self
            .dequeued
            .saturating_add(self.counters.pending.load(Ordering::Acquire));
        self.export_until(target)
    }

    /// Exports queued records in batches, oldest first, until `target`
    /// records have been taken off the queue or it runs empty.
    fn export_until(&mut self, target: usize) -> SdkResult {
        let mut results = Vec::new();
        while self.dequeued < target {
            let batch_size = self
                .config
                .max_export_batch_size
                .min(target - self.dequeued);
            while self.batch.len() < batch_size {
                match self.records.try_recv() {
                    Ok(record) => {
                        self.batch.push(record);
                        self.dequeued += 1;
                    }
                    Err(_) => break,
                }
            }
            if self.batch.is_empty() {
                break;
            }

            let count = self.batch.len();
            let result = self.sink.export(&mut self.batch);
            self.batch.clear();
            self.counters.pending.fetch_sub(count, Ordering::AcqRel);

            if let Err(err) = &result {
                self.counters.export_failures.fetch_add(1, Ordering::Relaxed);
                diag_error!(
                    name: "BatchProcessor.ExportError",
                    processor = self.name,
                    batch_size = count,
                    error = err.to_string()
                );
            }
            results.push(result);
        }
        combine_results(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Sender;

    #[test]
    fn sizes_are_at_least_one_and_batch_fits_queue() {
        assert_eq!(clamp_sizes(0, 0), (1, 1));
        assert_eq!(clamp_sizes(16, 0), (16, 1));
        assert_eq!(clamp_sizes(0, 512), (1, 1));
        assert_eq!(clamp_sizes(8, 512), (8, 8));
        assert_eq!(clamp_sizes(2048, 512), (2048, 512));
    }

    #[derive(Debug, Default, Clone)]
    struct Recorded {
        batches: Arc<Mutex<Vec<Vec<u32>>>>,
        shutdowns: Arc<AtomicUsize>,
        resources: Arc<AtomicUsize>,
    }

    impl Recorded {
        fn exported(&self) -> Vec<u32> {
            self.batches.lock().unwrap().iter().flatten().copied().collect()
        }

        fn wait_for(&self, count: usize) -> bool {
            let deadline = Instant::now() + Duration::from_secs(5);
            while Instant::now() < deadline {
                if self.exported().len() >= count {
                    return true;
                }
                thread::sleep(Duration::from_millis(5));
            }
            false
        }
    }

    struct TestSink {
        recorded: Recorded,
        fail: bool,
        // Export blocks on this gate when present, after announcing itself.
        gate: Option<(Sender<()>, Receiver<()>)>,
    }

    impl TestSink {
        fn new(recorded: &Recorded) -> Self {
            TestSink {
                recorded: recorded.clone(),
                fail: false,
                gate: None,
            }
        }
    }

    impl BatchSink<u32> for TestSink {
        fn export(&mut self, batch: &mut Vec<u32>) -> SdkResult {
            if let Some((started, release)) = &self.gate {
                let _ = started.send(());
                let _ = release.recv();
            }
            self.recorded.batches.lock().unwrap().push(batch.clone());
            if self.fail {
                Err(SdkError::ExportFailed("unavailable".into()))
            } else {
                Ok(())
            }
        }

        fn force_flush(&mut self) -> SdkResult {
            Ok(())
        }

        fn shutdown(&mut self, _timeout: Duration) -> SdkResult {
            self.recorded.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn set_resource(&mut self, _resource: &Resource) {
            self.recorded.resources.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config(max_queue_size: usize, max_export_batch_size: usize) -> WorkerConfig {
        WorkerConfig {
            max_queue_size,
            max_export_batch_size,
            scheduled_delay: Duration::from_secs(3600),
            max_export_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn flush_exports_accepted_records_in_order_and_in_batches() {
        let recorded = Recorded::default();
        let worker = BatchWorker::new("test", TestSink::new(&recorded), config(100, 4));
        for i in 0..10 {
            worker.submit(i);
        }
        assert!(worker.force_flush().is_ok());

        assert_eq!(recorded.exported(), (0..10).collect::<Vec<_>>());
        assert!(recorded.batches.lock().unwrap().iter().all(|b| b.len() <= 4));
        assert!(worker.shutdown().is_ok());
    }

    #[test]
    fn reaching_batch_size_triggers_export() {
        let recorded = Recorded::default();
        let worker = BatchWorker::new("test", TestSink::new(&recorded), config(100, 3));
        for i in 0..3 {
            worker.submit(i);
        }
        assert!(recorded.wait_for(3));
        assert!(worker.shutdown().is_ok());
    }

    #[test]
    fn scheduled_delay_triggers_export() {
        let recorded = Recorded::default();
        let worker = BatchWorker::new(
            "test",
            TestSink::new(&recorded),
            WorkerConfig {
                scheduled_delay: Duration::from_millis(10),
                ..config(100, 50)
            },
        );
        worker.submit(7);
        assert!(recorded.wait_for(1));
        assert!(worker.shutdown().is_ok());
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let recorded = Recorded::default();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let sink = TestSink {
            gate: Some((started_tx, release_rx)),
            ..TestSink::new(&recorded)
        };
        let worker = BatchWorker::new("test", sink, config(2, 2));

        // the first two records reach the batch size, the worker takes them
        // and blocks inside export
        worker.submit(0);
        worker.submit(1);
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let start = Instant::now();
        for i in 2..7 {
            worker.submit(i);
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(worker.dropped_count(), 3);

        for _ in 0..3 {
            release_tx.send(()).unwrap();
        }
        assert!(worker.shutdown().is_ok());
        assert_eq!(recorded.exported(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn zero_timeout_flush_times_out_without_losing_records() {
        let recorded = Recorded::default();
        let worker = BatchWorker::new("test", TestSink::new(&recorded), config(100, 50));
        for i in 0..3 {
            worker.submit(i);
        }
        assert!(matches!(
            worker.force_flush_with_timeout(Duration::ZERO),
            Err(SdkError::Timeout(_))
        ));
        assert!(worker.shutdown().is_ok());
        assert_eq!(recorded.exported(), vec![0, 1, 2]);
    }

    #[test]
    fn shutdown_is_terminal_and_idempotent() {
        let recorded = Recorded::default();
        let worker = BatchWorker::new("test", TestSink::new(&recorded), config(100, 50));
        worker.set_resource(&Resource::empty());
        worker.submit(1);

        assert!(worker.shutdown().is_ok());
        assert!(worker.shutdown().is_ok());
        assert_eq!(recorded.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(recorded.resources.load(Ordering::SeqCst), 1);

        worker.submit(2);
        assert!(worker.force_flush().is_ok());
        assert_eq!(recorded.exported(), vec![1]);
    }

    #[test]
    fn records_accepted_during_flush_wait_for_next_cycle() {
        let recorded = Recorded::default();
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let sink = TestSink {
            gate: Some((started_tx, release_rx)),
            ..TestSink::new(&recorded)
        };
        let worker = Arc::new(BatchWorker::new("test", sink, config(100, 50)));

        worker.submit(0);
        let first_flush = {
            let worker = Arc::clone(&worker);
            thread::spawn(move || worker.force_flush())
        };
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // queued behind the running export, covering records 1 and 2 only
        worker.submit(1);
        worker.submit(2);
        assert!(matches!(
            worker.force_flush_with_timeout(Duration::ZERO),
            Err(SdkError::Timeout(_))
        ));
        worker.submit(3);
        worker.submit(4);

        for _ in 0..3 {
            release_tx.send(()).unwrap();
        }
        assert!(first_flush.join().unwrap().is_ok());
        assert!(recorded.wait_for(3));
        assert_eq!(*recorded.batches.lock().unwrap(), vec![vec![0], vec![1, 2]]);

        assert!(worker.shutdown().is_ok());
        assert_eq!(recorded.exported(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn export_failures_are_counted_and_reported() {
        let recorded = Recorded::default();
        let sink = TestSink {
            fail: true,
            ..TestSink::new(&recorded)
        };
        let worker = BatchWorker::new("test", sink, config(100, 50));
        worker.submit(1);
        assert!(worker.force_flush().is_err());
        assert_eq!(worker.export_failures(), 1);
        assert!(worker.shutdown().is_ok());
    }

    #[test]
    fn env_values_ignore_garbage() {
        temp_env::with_vars(
            [("BATCH_TEST_SIZE", Some(" 42 ")), ("BATCH_TEST_BAD", Some("x"))],
            || {
                assert_eq!(env_value::<usize>("BATCH_TEST_SIZE"), Some(42));
                assert_eq!(env_value::<usize>("BATCH_TEST_BAD"), None);
                assert_eq!(env_value::<u64>("BATCH_TEST_MISSING"), None);
            },
        );
    }
}
