//! Errors shared by the export, flush and shutdown paths of every signal.
use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// Outcome of an export, flush or shutdown operation.
pub type SdkResult = Result<(), SdkError>;

/// Errors returned by exporters, processors, readers and providers.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SdkError {
    /// The operation did not complete within the given time. The work may
    /// still finish in the background.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The component could not carry out the operation, for example because a
    /// lock was poisoned or the worker thread is gone.
    #[error("Operation failed: {0}")]
    InternalFailure(String),

    /// The exporter failed to deliver a batch.
    #[error("Export failed: {0}")]
    ExportFailed(String),
}

impl<T> From<PoisonError<T>> for SdkError {
    fn from(err: PoisonError<T>) -> Self {
        SdkError::InternalFailure(format!("lock poisoned: {err}"))
    }
}

/// Folds the outcomes of several collaborators into one result, keeping
/// every failure message.
pub(crate) fn combine_results(results: Vec<SdkResult>) -> SdkResult {
    let errors: Vec<String> = results
        .into_iter()
        .filter_map(|r| r.err())
        .map(|e| e.to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SdkError::InternalFailure(errors.join("; ")))
    }
}
