//! Transaction context for OCC
//!
//! A `TransactionContext` is scoped to one series. It records the version of
//! that series the first time it reads it (the read set) and buffers every
//! write until commit. At commit the manager validates the read set under the
//! series' commit lock, materializes the buffered writes into a `WriteBatch`
//! and applies it.
//!
//! Reads see the transaction's own buffered writes: a series created in this
//! transaction exists, and a buffered build is found by its commit.

use crate::validation::ValidationResult;
use buildseq_core::{
    BuildNumber, BuildRecord, Error, Result, SeriesKey, SeriesRecord, Storage,
};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error type for commit failures
#[derive(Debug, Error)]
pub enum CommitError {
    /// The read set no longer matches the store
    #[error("Commit failed: {} conflict(s)", .0.conflict_count())]
    ValidationFailed(ValidationResult),

    /// Transaction was not in a state that allows commit
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// WAL write failed; nothing was applied
    #[error("WAL error: {0}")]
    WALError(String),

    /// The store rejected the batch
    #[error(transparent)]
    Storage(Error),
}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => Error::Conflict(format!(
                "validation failed: {} conflict(s)",
                result.conflict_count()
            )),
            CommitError::InvalidState(state) => Error::TransactionNotActive { state },
            CommitError::WALError(msg) => Error::StorageError(format!("WAL error: {}", msg)),
            CommitError::Storage(e) => e,
        }
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (begin commit)
/// - `Validating` → `Committed` (validation passed)
/// - `Validating` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (user abort or error)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction is being validated for conflicts
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// A build insert waiting for commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBuild {
    /// Commit identifier
    pub commit: String,
    /// Number to assign
    pub build_number: BuildNumber,
}

/// Summary of buffered writes that an abort would discard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperations {
    /// Series creation buffered
    pub create_series: bool,
    /// Number of buffered build inserts
    pub builds: usize,
    /// Series deletion buffered
    pub delete_series: bool,
}

impl PendingOperations {
    /// Total number of buffered row operations
    pub fn total(&self) -> usize {
        usize::from(self.create_series) + self.builds + usize::from(self.delete_series)
    }

    /// True if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Per-transaction state: identity, read set, buffered writes
///
/// # Lifecycle
///
/// 1. **BEGIN**: created by `TransactionManager::begin`, status `Active`
/// 2. **READ/WRITE**: `series_exists`, `get_build`, `max_build_number`,
///    `create_series`, `insert_build`, `delete_series`
/// 3. **COMMIT**: `TransactionManager::commit` validates and applies
/// 4. **ABORT**: `mark_aborted`, or simply drop the context
pub struct TransactionContext {
    /// Unique transaction ID
    pub txn_id: u64,
    /// Series this transaction is scoped to
    pub series: SeriesKey,
    /// Store version when the transaction began
    pub start_version: u64,
    /// Series version observed by the first read (None until a read happens)
    read_version: Option<u64>,
    create_series: bool,
    builds: Vec<PendingBuild>,
    delete_series: bool,
    /// Current transaction status
    pub status: TransactionStatus,
    start_time: Instant,
}

impl TransactionContext {
    /// Create a new, active transaction
    ///
    /// # Example
    ///
    /// ```
    /// use buildseq_concurrency::TransactionContext;
    /// use buildseq_core::SeriesKey;
    ///
    /// let txn = TransactionContext::new(1, SeriesKey::new(1, 1), 0);
    /// assert!(txn.is_active());
    /// ```
    pub fn new(txn_id: u64, series: SeriesKey, start_version: u64) -> Self {
        Self {
            txn_id,
            series,
            start_version,
            read_version: None,
            create_series: false,
            builds: Vec::new(),
            delete_series: false,
            status: TransactionStatus::Active,
            start_time: Instant::now(),
        }
    }

    // === Reads ===

    fn observe(&mut self, version: u64) -> Result<()> {
        match self.read_version {
            None => {
                self.read_version = Some(version);
                Ok(())
            }
            Some(seen) if seen == version => Ok(()),
            Some(seen) => Err(Error::conflict(format!(
                "series {} changed during transaction {} (version {} → {})",
                self.series, self.txn_id, seen, version
            ))),
        }
    }

    /// Series version recorded in the read set
    pub fn read_version(&self) -> Option<u64> {
        self.read_version
    }

    /// Committed series row (a series created in this transaction has no row yet)
    pub fn get_series<S: Storage>(&mut self, store: &S) -> Result<Option<SeriesRecord>> {
        self.ensure_active()?;
        let read = store.get_series(&self.series)?;
        self.observe(read.version)?;
        Ok(if self.delete_series { None } else { read.value })
    }

    /// True if the series exists, counting this transaction's own writes
    pub fn series_exists<S: Storage>(&mut self, store: &S) -> Result<bool> {
        if self.create_series {
            return Ok(true);
        }
        Ok(self.get_series(store)?.is_some())
    }

    /// Committed build row for `commit`
    pub fn get_build<S: Storage>(&mut self, store: &S, commit: &str) -> Result<Option<BuildRecord>> {
        self.ensure_active()?;
        let read = store.get_build(&self.series, commit)?;
        self.observe(read.version)?;
        Ok(read.value)
    }

    /// Build number of `commit`, buffered inserts included
    pub fn build_number<S: Storage>(&mut self, store: &S, commit: &str) -> Result<Option<BuildNumber>> {
        if let Some(pending) = self.builds.iter().find(|b| b.commit == commit) {
            return Ok(Some(pending.build_number));
        }
        Ok(self.get_build(store, commit)?.map(|b| b.build_number))
    }

    /// Highest build number in the series, buffered inserts included
    pub fn max_build_number<S: Storage>(&mut self, store: &S) -> Result<Option<BuildNumber>> {
        self.ensure_active()?;
        let read = store.max_build_number(&self.series)?;
        self.observe(read.version)?;
        let pending = self.builds.iter().map(|b| b.build_number).max();
        Ok(read.value.max(pending))
    }

    // === Writes ===

    /// Buffer creation of the series
    ///
    /// # Errors
    ///
    /// `DuplicateSeries` if the series already exists.
    pub fn create_series<S: Storage>(&mut self, store: &S) -> Result<()> {
        if self.series_exists(store)? {
            return Err(Error::DuplicateSeries(self.series));
        }
        self.create_series = true;
        Ok(())
    }

    /// Buffer a build insert
    ///
    /// The series must exist (committed or created in this transaction).
    /// Uniqueness against committed rows is enforced at commit; uniqueness
    /// among buffered rows is enforced here.
    pub fn insert_build<S: Storage>(
        &mut self,
        store: &S,
        commit: impl Into<String>,
        build_number: BuildNumber,
    ) -> Result<()> {
        let commit = commit.into();
        if !self.series_exists(store)? {
            return Err(Error::SeriesNotFound(self.series));
        }
        if self.builds.iter().any(|b| b.commit == commit) {
            return Err(Error::DuplicateCommit {
                series: self.series,
                commit,
            });
        }
        if self.builds.iter().any(|b| b.build_number == build_number) {
            return Err(Error::DuplicateBuildNumber {
                series: self.series,
                build_number,
            });
        }
        self.builds.push(PendingBuild {
            commit,
            build_number,
        });
        Ok(())
    }

    /// Buffer deletion of the series
    ///
    /// The store refuses the deletion at commit if any build references the
    /// series.
    pub fn delete_series(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.create_series || !self.builds.is_empty() {
            return Err(Error::invalid_input(
                "cannot delete a series written in the same transaction",
            ));
        }
        self.delete_series = true;
        Ok(())
    }

    /// True if a series creation is buffered
    pub fn creates_series(&self) -> bool {
        self.create_series
    }

    /// True if a series deletion is buffered
    pub fn deletes_series(&self) -> bool {
        self.delete_series
    }

    /// Buffered build inserts in insertion order
    pub fn pending_builds(&self) -> &[PendingBuild] {
        &self.builds
    }

    /// Summary of buffered writes
    pub fn pending_operations(&self) -> PendingOperations {
        PendingOperations {
            create_series: self.create_series,
            builds: self.builds.len(),
            delete_series: self.delete_series,
        }
    }

    /// True if nothing would be written on commit
    pub fn is_read_only(&self) -> bool {
        self.pending_operations().is_empty()
    }

    // === State Management ===

    /// Check if transaction is in Active state
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Check if transaction is committed
    pub fn is_committed(&self) -> bool {
        matches!(self.status, TransactionStatus::Committed)
    }

    /// Check if transaction is aborted
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// Time since the transaction began
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Check if transaction can accept operations
    ///
    /// # Errors
    /// `TransactionNotActive` if the transaction is not `Active`.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::TransactionNotActive {
                state: format!("{:?}", self.status),
            })
        }
    }

    /// `Active` → `Validating`
    pub fn mark_validating(&mut self) -> std::result::Result<(), CommitError> {
        if !self.is_active() {
            return Err(CommitError::InvalidState(format!(
                "Cannot commit transaction {} from {:?} state - must be Active",
                self.txn_id, self.status
            )));
        }
        self.status = TransactionStatus::Validating;
        Ok(())
    }

    /// `Validating` → `Committed`
    pub fn mark_committed(&mut self) -> std::result::Result<(), CommitError> {
        match self.status {
            TransactionStatus::Validating => {
                self.status = TransactionStatus::Committed;
                Ok(())
            }
            _ => Err(CommitError::InvalidState(format!(
                "Cannot commit transaction {} from state {:?}",
                self.txn_id, self.status
            ))),
        }
    }

    /// Abort and discard all buffered writes
    ///
    /// Allowed from `Active` and `Validating`.
    pub fn mark_aborted(&mut self, reason: impl Into<String>) -> Result<()> {
        match self.status {
            TransactionStatus::Committed => Err(Error::invalid_input(format!(
                "Cannot abort committed transaction {}",
                self.txn_id
            ))),
            TransactionStatus::Aborted { .. } => Err(Error::invalid_input(format!(
                "Transaction {} already aborted",
                self.txn_id
            ))),
            _ => {
                self.status = TransactionStatus::Aborted {
                    reason: reason.into(),
                };
                self.create_series = false;
                self.builds.clear();
                self.delete_series = false;
                Ok(())
            }
        }
    }
}
