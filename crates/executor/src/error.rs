//! Error types for request execution.
//!
//! Each variant is one response class. The `Display` text is the message
//! sent to the client and [`Error::status`] is the status code.

use serde::{Deserialize, Serialize};

/// Result type alias for executor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Supported endpoints, listed when a request names no series.
pub(crate) const ENDPOINTS: &str =
    "POST /<series>/<commit_hash>\nGET /<series>/<commit_hash>\nGET /<series>";

/// Request execution errors.
///
/// | Category | Variants | Status |
/// |----------|----------|--------|
/// | Authentication | `Unauthorized` | 401 |
/// | Validation | `InvalidSeries`, `CommitTooShort`, `CommitTooLong` | 400 |
/// | Not Found | `SeriesNotFound`, `BuildNotFound`, `InvalidEndpoint` | 404 |
/// | Routing | `InvalidMethod` | 405 |
/// | Concurrency | `Conflict`, `Busy` | 409 |
/// | Limits | `Overflow` | 422 |
/// | System | `Internal` | 500 |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    /// Missing or unknown token
    #[error("Unauthorized")]
    Unauthorized,

    /// Series text is not `<major>.<minor>`
    #[error("Invalid parameter: series. Format: <major>.<minor>")]
    InvalidSeries {
        /// Text as received
        series: String,
    },

    /// Commit shorter than the configured minimum
    #[error("Invalid parameter: commit. Must be at least {min} characters long")]
    CommitTooShort {
        /// Configured minimum
        min: usize,
    },

    /// Commit longer than the column allows
    #[error("Invalid parameter: commit. Must be at most {max} characters long")]
    CommitTooLong {
        /// Maximum length
        max: usize,
    },

    /// Series has never been allocated into
    #[error("Unknown series!")]
    SeriesNotFound {
        /// Series display form
        series: String,
    },

    /// Commit has no build in the series
    #[error("Unknown build!")]
    BuildNotFound {
        /// Series display form
        series: String,
        /// Commit as received
        commit: String,
    },

    /// Request names no series
    #[error("Invalid API endpoint. Supported API endpoints are:\n\n{}", ENDPOINTS)]
    InvalidEndpoint,

    /// Method not supported on the endpoint
    #[error("Invalid method")]
    InvalidMethod {
        /// Method as received
        method: String,
    },

    /// The commit was inserted concurrently
    #[error("Commit does already exist in series!")]
    Conflict {
        /// Internal detail (not sent to clients)
        reason: String,
    },

    /// Concurrent writers kept winning; the commit may or may not exist
    #[error("Series is busy. Please retry.")]
    Busy {
        /// Internal detail (not sent to clients)
        reason: String,
    },

    /// The series holds build 65535
    #[error("New build number exceeds protocol version bits!")]
    Overflow {
        /// Series display form
        series: String,
    },

    /// Storage or WAL failure
    #[error("Internal storage failure")]
    Internal {
        /// Internal detail (not sent to clients)
        reason: String,
    },
}

impl Error {
    /// Status code of the response class
    pub fn status(&self) -> u16 {
        match self {
            Error::Unauthorized => 401,
            Error::InvalidSeries { .. } | Error::CommitTooShort { .. } | Error::CommitTooLong { .. } => 400,
            Error::SeriesNotFound { .. } | Error::BuildNotFound { .. } | Error::InvalidEndpoint => 404,
            Error::InvalidMethod { .. } => 405,
            Error::Conflict { .. } | Error::Busy { .. } => 409,
            Error::Overflow { .. } => 422,
            Error::Internal { .. } => 500,
        }
    }

    /// True if repeating the request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Conflict { .. } | Error::Busy { .. } | Error::Internal { .. }
        )
    }
}
