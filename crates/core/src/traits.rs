//! Core traits for storage abstraction
//!
//! This module defines the read-side `Storage` trait that the transaction layer
//! validates against. Writes are not part of the trait: they only happen
//! through the commit path of the concurrency crate, which applies whole
//! transactions to a concrete store.

use crate::error::Result;
use crate::types::{BuildNumber, BuildRecord, SeriesKey, SeriesRecord, Versioned};

/// Read access to the Series/Build tables
///
/// Every point read returns the version of the series it touched, observed
/// atomically with the value. A series that does not exist has version 0.
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait Storage: Send + Sync {
    /// Get the series row for `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_series(&self, key: &SeriesKey) -> Result<Versioned<Option<SeriesRecord>>>;

    /// Get the build row for `commit` within the series `key`
    ///
    /// Returns `None` when either the series or the commit is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_build(&self, key: &SeriesKey, commit: &str) -> Result<Versioned<Option<BuildRecord>>>;

    /// Highest build number recorded for the series (None if it has no builds)
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn max_build_number(&self, key: &SeriesKey) -> Result<Versioned<Option<BuildNumber>>>;

    /// Series row and all its builds, ordered by build number ascending
    ///
    /// Returns `None` if the series does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn list_builds(&self, key: &SeriesKey) -> Result<Option<(SeriesRecord, Vec<BuildRecord>)>>;

    /// Current version of a series (0 if it does not exist)
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn series_version(&self, key: &SeriesKey) -> Result<u64>;

    /// Highest commit version applied to the store
    fn current_version(&self) -> u64;
}
