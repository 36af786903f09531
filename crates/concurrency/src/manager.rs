//! Transaction manager for coordinating commit operations
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. mark_validating()        Active → Validating
//! 2. take the series' commit lock
//! 3. validate_transaction()   read set against the store
//! 4. IF conflicts: abort, return ValidationFailed
//! 5. materialize the batch    ids, timestamps
//! 6. store.check_batch()      store constraints, before anything is logged
//! 7. allocate commit version
//! 8. WAL append               BeginTxn, rows, CommitTxn (DURABILITY POINT)
//! 9. store.apply_batch()      visibility
//! 10. mark_committed()
//! ```
//!
//! A crash before step 8 completes leaves no committed transaction in the
//! log; after it, recovery replays the transaction.
//!
//! Commits for different series never share a lock. Within one series, the
//! lock serializes validate-to-apply, which is what makes the per-series
//! version a sufficient read set.

use crate::transaction::{CommitError, TransactionContext};
use crate::validation::validate_transaction;
use buildseq_core::{BuildRecord, Result, SeriesKey, SeriesRecord, Storage};
use buildseq_durability::WAL;
use buildseq_storage::{LedgerStore, WriteBatch};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Outcome of a successful commit
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Transaction id
    pub txn_id: u64,
    /// Commit version (the current version for read-only transactions)
    pub version: u64,
    /// Rows written, with their assigned ids and timestamps
    pub batch: WriteBatch,
}

impl CommitReceipt {
    /// Series row created by the transaction, if any
    pub fn created_series(&self) -> Option<&SeriesRecord> {
        self.batch.create_series.as_ref()
    }

    /// Build rows created by the transaction
    pub fn created_builds(&self) -> &[BuildRecord] {
        &self.batch.builds
    }
}

/// Manages transaction lifecycle and atomic commits
pub struct TransactionManager {
    /// Global version counter, incremented once per committed write transaction
    version: AtomicU64,
    /// Next transaction ID
    next_txn_id: AtomicU64,
    /// One commit lock per series
    commit_locks: DashMap<SeriesKey, Arc<Mutex<()>>>,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new(initial_version: u64) -> Self {
        Self::with_txn_id(initial_version, 0)
    }

    /// Create a manager whose transaction ids continue after `max_txn_id`
    ///
    /// Used after recovery so new transactions never reuse an id in the WAL.
    pub fn with_txn_id(initial_version: u64, max_txn_id: u64) -> Self {
        TransactionManager {
            version: AtomicU64::new(initial_version),
            next_txn_id: AtomicU64::new(max_txn_id + 1),
            commit_locks: DashMap::new(),
        }
    }

    /// Current global version
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Allocate next commit version
    pub fn allocate_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Start a transaction on `series`
    pub fn begin(&self, series: SeriesKey) -> TransactionContext {
        let txn = TransactionContext::new(self.next_txn_id(), series, self.current_version());
        debug!(target: "buildseq::txn", txn_id = txn.txn_id, %series, "Transaction started");
        txn
    }

    fn series_lock(&self, series: SeriesKey) -> Arc<Mutex<()>> {
        Arc::clone(
            self.commit_locks
                .entry(series)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Commit a transaction atomically
    ///
    /// With `wal` set, the batch is logged before it is applied. Without it
    /// (ephemeral databases) the batch is applied directly.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the read set is stale or a buffered row was
    ///   committed by another transaction first
    /// - `InvalidState` if the transaction is not active
    /// - `Storage` if the store rejects the batch (nothing is logged)
    /// - `WALError` if logging fails (nothing is applied, and the WAL has
    ///   already cut the partial transaction back out)
    pub fn commit(
        &self,
        txn: &mut TransactionContext,
        store: &LedgerStore,
        wal: Option<&Mutex<WAL>>,
    ) -> std::result::Result<CommitReceipt, CommitError> {
        txn.mark_validating()?;

        let lock = self.series_lock(txn.series);
        let _guard = lock.lock();

        let validation = validate_transaction(txn, store).map_err(|e| {
            abort(txn, format!("validation failed: {}", e));
            CommitError::Storage(e)
        })?;
        if !validation.is_valid() {
            abort(txn, format!("{} conflict(s)", validation.conflict_count()));
            debug!(
                target: "buildseq::txn",
                txn_id = txn.txn_id,
                series = %txn.series,
                conflicts = validation.conflict_count(),
                "Transaction failed validation"
            );
            return Err(CommitError::ValidationFailed(validation));
        }

        if txn.is_read_only() {
            txn.mark_committed()?;
            return Ok(CommitReceipt {
                txn_id: txn.txn_id,
                version: self.current_version(),
                batch: WriteBatch::new(txn.series),
            });
        }

        let batch = materialize(txn, store).map_err(|e| {
            abort(txn, e.to_string());
            CommitError::Storage(e)
        })?;
        if let Err(e) = store.check_batch(&batch) {
            abort(txn, e.to_string());
            return Err(CommitError::Storage(e));
        }

        let version = self.allocate_version();
        if let Some(wal) = wal {
            if let Err(e) = wal.lock().append_transaction(txn.txn_id, version, &batch) {
                abort(txn, format!("WAL write failed: {}", e));
                return Err(CommitError::WALError(e.to_string()));
            }
        }

        if let Err(e) = store.apply_batch(&batch, version) {
            error!(
                target: "buildseq::txn",
                txn_id = txn.txn_id,
                version,
                error = %e,
                "Store rejected a logged batch; recovery will not replay this history"
            );
            abort(txn, e.to_string());
            return Err(CommitError::Storage(e));
        }

        txn.mark_committed()?;
        debug!(
            target: "buildseq::txn",
            txn_id = txn.txn_id,
            series = %txn.series,
            version,
            rows = batch.len(),
            "Transaction committed"
        );
        Ok(CommitReceipt {
            txn_id: txn.txn_id,
            version,
            batch,
        })
    }

    /// Explicitly abort a transaction
    ///
    /// Nothing is written anywhere; buffered writes are discarded.
    pub fn abort(&self, txn: &mut TransactionContext, reason: impl Into<String>) -> Result<()> {
        txn.mark_aborted(reason)
    }
}

fn abort(txn: &mut TransactionContext, reason: String) {
    // Only fails if the transaction is already terminal
    let _ = txn.mark_aborted(reason);
}

/// Turn buffered writes into fully materialized rows
///
/// Runs under the series' commit lock: the series row read here cannot
/// change before the batch is applied.
fn materialize(txn: &TransactionContext, store: &LedgerStore) -> Result<WriteBatch> {
    let now = Utc::now();
    let mut batch = WriteBatch::new(txn.series);

    let series_id = if txn.creates_series() {
        let record = SeriesRecord {
            id: store.allocate_series_id(),
            key: txn.series,
            created_on: now,
        };
        let id = record.id;
        batch.create_series = Some(record);
        Some(id)
    } else {
        store.get_series(&txn.series)?.value.map(|record| record.id)
    };

    if !txn.pending_builds().is_empty() {
        let series_id = series_id.ok_or(buildseq_core::Error::SeriesNotFound(txn.series))?;
        for pending in txn.pending_builds() {
            batch.builds.push(BuildRecord {
                id: store.allocate_build_id(),
                series_id,
                commit: pending.commit.clone(),
                build_number: pending.build_number,
                created_on: now,
            });
        }
    }

    batch.delete_series = txn.deletes_series();
    Ok(batch)
}
