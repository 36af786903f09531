//! Error types for buildseq
//!
//! This module defines all error types used throughout the storage and
//! transaction layers. We use `thiserror` for automatic `Display` and `Error`
//! trait implementations.
//!
//! The API layer (executor) maps these onto response classes; use the
//! classifier methods (`is_conflict`, `is_not_found`, ...) rather than
//! matching variants when only the class matters.

use crate::types::{BuildNumber, SeriesId, SeriesKey};
use std::io;
use thiserror::Error;

/// Result type alias for buildseq operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the buildseq store
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (WAL file, config file, lock file)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Buffer ended before a complete WAL entry could be read
    ///
    /// Expected at the tail of a log after a crash mid-write; not corruption.
    #[error("Incomplete entry at offset {offset}: have {have} bytes, need {needed}")]
    IncompleteEntry {
        /// File offset of the entry
        offset: u64,
        /// Bytes available
        have: usize,
        /// Bytes required
        needed: usize,
    },

    /// No series with this (major, minor)
    #[error("Unknown series: {0}")]
    SeriesNotFound(SeriesKey),

    /// No build for this commit in the series
    #[error("Unknown build: commit {commit} in series {series}")]
    BuildNotFound {
        /// Series that was searched
        series: SeriesKey,
        /// Commit that was not found
        commit: String,
    },

    /// A series with this (major, minor) already exists
    #[error("Series {0} already exists")]
    DuplicateSeries(SeriesKey),

    /// The commit already has a build in this series
    #[error("Commit {commit} already exists in series {series}")]
    DuplicateCommit {
        /// Series of the existing build
        series: SeriesKey,
        /// Commit of the existing build
        commit: String,
    },

    /// The build number is already taken in this series
    #[error("Build number {build_number} already exists in series {series}")]
    DuplicateBuildNumber {
        /// Series of the existing build
        series: SeriesKey,
        /// Taken build number
        build_number: BuildNumber,
    },

    /// A build referenced a series id that does not exist
    #[error("Build references unknown series id {0}")]
    DanglingBuild(SeriesId),

    /// Deleting the series would orphan its builds
    #[error("Series {series} is referenced by {builds} build(s) and cannot be deleted")]
    SeriesProtected {
        /// Series whose deletion was refused
        series: SeriesKey,
        /// Number of builds referencing it
        builds: usize,
    },

    /// The next build number would exceed the 16-bit ceiling
    #[error("Build number overflow in series {0}: next number would exceed 65535")]
    Overflow(SeriesKey),

    /// Optimistic transaction lost against a concurrent writer
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Every retry of an allocation lost to a concurrent writer
    ///
    /// Says nothing about whether the commit exists; the caller may retry.
    #[error("Series {series} still contended after {attempts} attempts")]
    RetriesExhausted {
        /// Contended series
        series: SeriesKey,
        /// Attempts made, the first one included
        attempts: usize,
    },

    /// Transaction aborted (closure error, explicit abort)
    #[error("Transaction aborted: {reason}")]
    TransactionAborted {
        /// Why the transaction aborted
        reason: String,
    },

    /// Operation on a transaction that is no longer active
    #[error("Transaction not active: {state}")]
    TransactionNotActive {
        /// State the transaction was in
        state: String,
    },

    /// Invalid input or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Invariant violation or bug
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build an `InvalidInput` error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Build a `StorageError`
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::StorageError(msg.into())
    }

    /// Build an `Internal` error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// Build a `Conflict` error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    /// True for errors a transaction retry can resolve
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// True for lookups that found nothing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::SeriesNotFound(_) | Error::BuildNotFound { .. })
    }

    /// True when a store-enforced constraint rejected a write
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::DuplicateSeries(_)
                | Error::DuplicateCommit { .. }
                | Error::DuplicateBuildNumber { .. }
                | Error::DanglingBuild(_)
                | Error::SeriesProtected { .. }
        )
    }

    /// True for infrastructure failures a caller may retry later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Conflict(_)
                | Error::RetriesExhausted { .. }
                | Error::IoError(_)
                | Error::StorageError(_)
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_io() {
        let err = Error::IoError(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_display_series_not_found() {
        let err = Error::SeriesNotFound(SeriesKey::new(1, 2));
        let msg = err.to_string();
        assert!(msg.contains("Unknown series"));
        assert!(msg.contains("1.2"));
    }

    #[test]
    fn test_error_display_overflow() {
        let err = Error::Overflow(SeriesKey::new(3, 0));
        let msg = err.to_string();
        assert!(msg.contains("3.0"));
        assert!(msg.contains("65535"));
    }

    #[test]
    fn test_error_display_protected() {
        let err = Error::SeriesProtected {
            series: SeriesKey::new(1, 1),
            builds: 2,
        };
        assert!(err.to_string().contains("2 build(s)"));
    }

    #[test]
    fn test_classifiers() {
        assert!(Error::conflict("raced").is_conflict());
        assert!(Error::conflict("raced").is_transient());
        assert!(Error::storage("disk gone").is_transient());
        assert!(!Error::Overflow(SeriesKey::new(1, 1)).is_transient());

        assert!(Error::SeriesNotFound(SeriesKey::new(1, 1)).is_not_found());
        assert!(Error::BuildNotFound {
            series: SeriesKey::new(1, 1),
            commit: "abc".into(),
        }
        .is_not_found());

        assert!(Error::DuplicateSeries(SeriesKey::new(1, 1)).is_constraint_violation());
        assert!(Error::DanglingBuild(SeriesId(9)).is_constraint_violation());
        assert!(!Error::conflict("x").is_constraint_violation());

        let exhausted = Error::RetriesExhausted {
            series: SeriesKey::new(1, 1),
            attempts: 4,
        };
        assert!(exhausted.is_transient());
        assert!(!exhausted.is_conflict());
        assert_eq!(
            exhausted.to_string(),
            "Series 1.1 still contended after 4 attempts"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
    }

    #[test]
    fn test_error_from_bincode() {
        let invalid_data = vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<String> = bincode::deserialize(&invalid_data).map_err(|e| e.into());
        assert!(matches!(result, Err(Error::SerializationError(_))));
    }
}
