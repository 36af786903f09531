//! Error conversion from engine errors.
//!
//! Domain outcomes keep their class; everything the client cannot act on
//! becomes `Internal` with the original text kept for logging.

use crate::Error;
use buildseq_core::Error as CoreError;

impl From<CoreError> for Error {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SeriesNotFound(series) => Error::SeriesNotFound {
                series: series.to_string(),
            },
            CoreError::BuildNotFound { series, commit } => Error::BuildNotFound {
                series: series.to_string(),
                commit,
            },
            CoreError::Overflow(series) => Error::Overflow {
                series: series.to_string(),
            },
            err @ CoreError::DuplicateCommit { .. } => Error::Conflict {
                reason: err.to_string(),
            },
            // Lost races that say nothing about the commit
            err @ (CoreError::Conflict(_)
            | CoreError::RetriesExhausted { .. }
            | CoreError::DuplicateSeries(_)
            | CoreError::DuplicateBuildNumber { .. }) => Error::Busy {
                reason: err.to_string(),
            },
            other => Error::Internal {
                reason: other.to_string(),
            },
        }
    }
}
