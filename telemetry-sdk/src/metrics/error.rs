use std::result;
use std::sync::PoisonError;
use thiserror::Error;

use crate::error::SdkError;

/// A specialized `Result` type for metric operations.
pub type MetricResult<T> = result::Result<T, MetricError>;

/// Errors returned by the metrics SDK.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MetricError {
    /// Other errors not covered by specific cases.
    #[error("Metrics error: {0}")]
    Other(String),
    /// Invalid configuration
    #[error("Config error {0}")]
    Config(String),
    /// Invalid instrument configuration such as an invalid instrument name,
    /// unit or histogram boundaries.
    #[error("Invalid instrument configuration: {0}")]
    InvalidInstrumentConfiguration(&'static str),
    /// A collection is already running on this reader.
    #[error("Collection already in progress")]
    CollectInProgress,
    /// The reader or provider was shut down.
    #[error("Reader is shut down or not registered")]
    Shutdown,
}

impl<T> From<PoisonError<T>> for MetricError {
    fn from(err: PoisonError<T>) -> Self {
        MetricError::Other(err.to_string())
    }
}

impl From<SdkError> for MetricError {
    fn from(err: SdkError) -> Self {
        MetricError::Other(err.to_string())
    }
}

impl From<MetricError> for SdkError {
    fn from(err: MetricError) -> Self {
        SdkError::InternalFailure(err.to_string())
    }
}
