//! Log exporters
use crate::error::SdkResult;
use crate::logs::SdkLogRecord;
use crate::Resource;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use telemetry::InstrumentationScope;

/// A batch of log records to be exported by a `LogExporter`.
///
/// The `LogBatch` struct holds a collection of log records along with their associated
/// instrumentation scopes. This structure is used to group log records together for efficient
/// export operations.
#[derive(Debug)]
pub struct LogBatch<'a> {
    data: LogBatchData<'a>,
}

/// The `LogBatchData` enum represents the data field of a `LogBatch`.
/// It can either be:
/// - A shared reference to a slice of boxed tuples, where each tuple consists of an owned `LogRecord` and an owned `InstrumentationScope`.
/// - Or it can be a shared reference to a slice of tuples, where each tuple consists of a reference to a `LogRecord` and a reference to an `InstrumentationScope`.
#[derive(Debug)]
enum LogBatchData<'a> {
    SliceOfOwnedData(&'a [Box<(SdkLogRecord, InstrumentationScope)>]), // Used by BatchProcessor which clones the LogRecords for its own use.
    SliceOfBorrowedData(&'a [(&'a SdkLogRecord, &'a InstrumentationScope)]),
}

impl<'a> LogBatch<'a> {
    /// Creates a new instance of `LogBatch` over borrowed records.
    pub fn new(data: &'a [(&'a SdkLogRecord, &'a InstrumentationScope)]) -> LogBatch<'a> {
        LogBatch {
            data: LogBatchData::SliceOfBorrowedData(data),
        }
    }

    pub(crate) fn new_with_owned_data(
        data: &'a [Box<(SdkLogRecord, InstrumentationScope)>],
    ) -> LogBatch<'a> {
        LogBatch {
            data: LogBatchData::SliceOfOwnedData(data),
        }
    }
}

impl LogBatch<'_> {
    /// Returns an iterator over the log records and instrumentation scopes in the batch.
    ///
    /// Each item yielded by the iterator is a tuple containing references to a `LogRecord`
    /// and an `InstrumentationScope`.
    pub fn iter(&self) -> impl Iterator<Item = (&SdkLogRecord, &InstrumentationScope)> {
        LogBatchDataIter {
            data: &self.data,
            index: 0,
        }
    }

    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        match self.data {
            LogBatchData::SliceOfOwnedData(data) => data.len(),
            LogBatchData::SliceOfBorrowedData(data) => data.len(),
        }
    }

    /// Whether the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct LogBatchDataIter<'a> {
    data: &'a LogBatchData<'a>,
    index: usize,
}

impl<'a> Iterator for LogBatchDataIter<'a> {
    type Item = (&'a SdkLogRecord, &'a InstrumentationScope);

    fn next(&mut self) -> Option<Self::Item> {
        let item = match self.data {
            LogBatchData::SliceOfOwnedData(data) => data
                .get(self.index)
                .map(|record| (&record.0, &record.1)),
            LogBatchData::SliceOfBorrowedData(data) => {
                data.get(self.index).map(|record| (record.0, record.1))
            }
        };
        if item.is_some() {
            self.index += 1;
        }
        item
    }
}

/// `LogExporter` defines the interface that log exporters should implement.
///
/// Exporters are driven from one thread at a time, and the returned future
/// is polled to completion with `futures_executor::block_on`.
pub trait LogExporter: Send + Sync + Debug {
    /// Exports a batch of log records and their associated instrumentation scopes.
    ///
    /// The `export` method is responsible for sending a batch of log records to an external
    /// destination. It takes a `LogBatch` as an argument, which contains references to the
    /// log records and their corresponding instrumentation scopes. A failed
    /// export is logged by the caller and not retried.
    fn export(&self, batch: LogBatch<'_>) -> impl Future<Output = SdkResult> + Send;

    /// Shuts down the exporter.
    ///
    /// Repeated calls must return `Ok(())` without side effects.
    fn shutdown_with_timeout(&mut self, _timeout: Duration) -> SdkResult {
        Ok(())
    }

    /// Shuts down the exporter with a default timeout.
    fn shutdown(&mut self) -> SdkResult {
        self.shutdown_with_timeout(Duration::from_secs(5))
    }

    /// Exports any records the exporter buffers itself.
    fn force_flush(&mut self) -> SdkResult {
        Ok(())
    }

    /// Set the resource for the exporter.
    fn set_resource(&mut self, _resource: &Resource) {}
}
