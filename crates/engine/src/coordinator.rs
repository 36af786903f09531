//! Transaction coordinator for managing transaction lifecycle
//!
//! The TransactionCoordinator wraps TransactionManager and adds:
//! - Active transaction tracking
//! - Transaction metrics (started, committed, aborted)
//! - Idle detection for shutdown

use buildseq_concurrency::{CommitError, CommitReceipt, TransactionContext, TransactionManager};
use buildseq_core::SeriesKey;
use buildseq_durability::{ReplayStats, WAL};
use buildseq_storage::LedgerStore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Transaction coordinator for the database
///
/// Metric counters use Relaxed ordering: they are observational only and
/// synchronize nothing else.
pub struct TransactionCoordinator {
    manager: TransactionManager,
    active_count: AtomicU64,
    total_started: AtomicU64,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
}

impl TransactionCoordinator {
    /// Create new coordinator with initial version
    pub fn new(initial_version: u64) -> Self {
        Self::with_manager(TransactionManager::new(initial_version))
    }

    /// Create coordinator from WAL replay statistics
    ///
    /// Both the final version and the highest transaction id must carry over,
    /// otherwise a new transaction could reuse an id already in the log.
    pub fn from_recovery(stats: &ReplayStats) -> Self {
        Self::with_manager(TransactionManager::with_txn_id(
            stats.final_version,
            stats.max_txn_id,
        ))
    }

    fn with_manager(manager: TransactionManager) -> Self {
        Self {
            manager,
            active_count: AtomicU64::new(0),
            total_started: AtomicU64::new(0),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
        }
    }

    /// Start a new transaction on `series`
    pub fn start_transaction(&self, series: SeriesKey) -> TransactionContext {
        self.record_start();
        self.manager.begin(series)
    }

    /// Commit a transaction through the concurrency layer
    ///
    /// Delegates the commit protocol to TransactionManager and records the
    /// outcome in the metrics. The `CommitError` is returned as-is so callers
    /// can inspect validation conflicts.
    pub fn commit(
        &self,
        txn: &mut TransactionContext,
        store: &LedgerStore,
        wal: Option<&Mutex<WAL>>,
    ) -> Result<CommitReceipt, CommitError> {
        match self.manager.commit(txn, store, wal) {
            Ok(receipt) => {
                self.record_commit();
                Ok(receipt)
            }
            Err(e) => {
                self.record_abort();
                match &e {
                    CommitError::ValidationFailed(_) => {
                        debug!(target: "buildseq::txn", txn_id = txn.txn_id, error = %e, "Transaction aborted")
                    }
                    _ => {
                        warn!(target: "buildseq::txn", txn_id = txn.txn_id, error = %e, "Transaction aborted")
                    }
                }
                Err(e)
            }
        }
    }

    /// Record transaction start
    pub fn record_start(&self) {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        self.total_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transaction commit
    pub fn record_commit(&self) {
        self.decrement_active();
        self.total_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transaction abort
    pub fn record_abort(&self) {
        self.decrement_active();
        self.total_aborted.fetch_add(1, Ordering::Relaxed);
    }

    fn decrement_active(&self) {
        // Saturating: never underflow if a record_* call is unbalanced
        let _ = self
            .active_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(1))
            });
    }

    /// Get current global version
    pub fn current_version(&self) -> u64 {
        self.manager.current_version()
    }

    /// Get transaction metrics
    pub fn metrics(&self) -> TransactionMetrics {
        let started = self.total_started.load(Ordering::Relaxed);
        let committed = self.total_committed.load(Ordering::Relaxed);

        TransactionMetrics {
            active_count: self.active_count.load(Ordering::Relaxed),
            total_started: started,
            total_committed: committed,
            total_aborted: self.total_aborted.load(Ordering::Relaxed),
            commit_rate: if started > 0 {
                committed as f64 / started as f64
            } else {
                0.0
            },
        }
    }

    /// Get current active transaction count
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until no transaction is active, or `timeout` expires
    ///
    /// Returns `false` on timeout.
    pub fn wait_for_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while self.active_count.load(Ordering::SeqCst) > 0 {
            if start.elapsed() > timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

/// Transaction metrics
#[derive(Debug, Clone)]
pub struct TransactionMetrics {
    /// Number of currently active transactions
    pub active_count: u64,
    /// Total number of transactions started
    pub total_started: u64,
    /// Total number of transactions committed
    pub total_committed: u64,
    /// Total number of transactions aborted
    pub total_aborted: u64,
    /// Commit success rate (committed / started)
    pub commit_rate: f64,
}

impl TransactionMetrics {
    /// Total transactions that completed (committed + aborted)
    pub fn total_completed(&self) -> u64 {
        self.total_committed + self.total_aborted
    }

    /// Abort rate (aborted / started)
    pub fn abort_rate(&self) -> f64 {
        if self.total_started > 0 {
            self.total_aborted as f64 / self.total_started as f64
        } else {
            0.0
        }
    }
}
