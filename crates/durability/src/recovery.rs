//! WAL replay for recovery
//!
//! Scans the log front to back, buffers each transaction's row entries until
//! its `CommitTxn` arrives, then applies the transaction to the store as one
//! `WriteBatch` stamped with the logged commit version. Transactions without
//! a `CommitTxn` (crash mid-append) are discarded.
//!
//! Entries of one transaction are contiguous in the file because the commit
//! path holds the WAL for the whole append, so applying in file order of
//! `CommitTxn` reproduces the original commit order within every series.
//!
//! Ids and timestamps come from the log; nothing is reassigned. After replay
//! the store's id counters and version resume past the highest values seen.

use crate::wal::{WalEntry, WalTail, WAL};
use buildseq_core::{Error, Result};
use buildseq_storage::{LedgerStore, WriteBatch};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Statistics from WAL replay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Committed transactions applied
    pub txns_applied: usize,
    /// Series rows created
    pub series_created: usize,
    /// Build rows created
    pub builds_applied: usize,
    /// Series rows deleted
    pub series_deleted: usize,
    /// Transactions discarded because their `CommitTxn` is missing
    pub incomplete_txns: usize,
    /// Row entries that belonged to no open transaction
    pub orphaned_entries: usize,
    /// Highest commit version in the log
    pub final_version: u64,
    /// Highest transaction id in the log, committed or not
    pub max_txn_id: u64,
    /// How the log ended
    pub tail: WalTail,
}

impl Default for ReplayStats {
    fn default() -> Self {
        Self {
            txns_applied: 0,
            series_created: 0,
            builds_applied: 0,
            series_deleted: 0,
            incomplete_txns: 0,
            orphaned_entries: 0,
            final_version: 0,
            max_txn_id: 0,
            tail: WalTail::Clean,
        }
    }
}

impl ReplayStats {
    /// True if the log was fully decodable and every transaction committed
    pub fn is_clean(&self) -> bool {
        self.tail == WalTail::Clean && self.incomplete_txns == 0 && self.orphaned_entries == 0
    }
}

/// Replay every committed transaction in `wal` into `store`
///
/// If the log ends in a torn or corrupt entry, replay stops there and the
/// file is truncated to its decodable prefix so new commits append cleanly.
/// The discarded suffix is reported in [`ReplayStats::tail`].
///
/// # Errors
///
/// - I/O errors reading or truncating the log
/// - `Error::Corruption` if a committed transaction violates a store
///   constraint, which means the log does not describe a valid history
///
/// # Example
///
/// ```ignore
/// let mut wal = WAL::open("data/wal/buildseq.wal", DurabilityMode::default())?;
/// let store = LedgerStore::new();
/// let stats = replay_wal(&mut wal, &store)?;
/// println!("Applied {} transactions", stats.txns_applied);
/// ```
pub fn replay_wal(wal: &mut WAL, store: &LedgerStore) -> Result<ReplayStats> {
    let contents = wal.read_all()?;
    let mut stats = ReplayStats {
        tail: contents.tail.clone(),
        ..Default::default()
    };
    let mut pending: HashMap<u64, WriteBatch> = HashMap::new();

    for entry in contents.entries {
        let txn_id = entry.txn_id();
        stats.max_txn_id = stats.max_txn_id.max(txn_id);

        match entry {
            WalEntry::BeginTxn { series, .. } => {
                if pending.insert(txn_id, WriteBatch::new(series)).is_some() {
                    warn!(target: "buildseq::recovery", txn_id, "Transaction began twice; earlier entries dropped");
                    stats.incomplete_txns += 1;
                }
            }
            WalEntry::SeriesCreated { record, .. } => match pending.get_mut(&txn_id) {
                Some(batch) => batch.create_series = Some(record),
                None => stats.orphaned_entries += 1,
            },
            WalEntry::BuildCreated { build, .. } => match pending.get_mut(&txn_id) {
                Some(batch) => batch.builds.push(build),
                None => stats.orphaned_entries += 1,
            },
            WalEntry::SeriesDeleted { .. } => match pending.get_mut(&txn_id) {
                Some(batch) => batch.delete_series = true,
                None => stats.orphaned_entries += 1,
            },
            WalEntry::CommitTxn { version, .. } => {
                let Some(batch) = pending.remove(&txn_id) else {
                    stats.orphaned_entries += 1;
                    continue;
                };
                store.apply_batch(&batch, version).map_err(|e| {
                    Error::Corruption(format!(
                        "committed transaction {} cannot be replayed: {}",
                        txn_id, e
                    ))
                })?;
                stats.txns_applied += 1;
                stats.series_created += usize::from(batch.create_series.is_some());
                stats.builds_applied += batch.builds.len();
                stats.series_deleted += usize::from(batch.delete_series);
                stats.final_version = stats.final_version.max(version);
                debug!(target: "buildseq::recovery", txn_id, version, series = %batch.series, "Replayed transaction");
            }
        }
    }

    stats.incomplete_txns += pending.len();
    store.set_version(stats.final_version);

    match &stats.tail {
        WalTail::Clean => {}
        WalTail::Torn { offset, bytes } => {
            warn!(target: "buildseq::recovery", offset, bytes, "Ignoring incomplete entry at end of WAL");
            wal.truncate(contents.valid_len)?;
        }
        WalTail::Corrupt { offset, reason } => {
            error!(target: "buildseq::recovery", offset, %reason, "WAL corruption; replay stopped early");
            wal.truncate(contents.valid_len)?;
        }
    }
    if stats.incomplete_txns > 0 || stats.orphaned_entries > 0 {
        warn!(
            target: "buildseq::recovery",
            incomplete = stats.incomplete_txns,
            orphaned = stats.orphaned_entries,
            "Discarded uncommitted WAL entries"
        );
    }

    info!(
        target: "buildseq::recovery",
        txns = stats.txns_applied,
        series = stats.series_created,
        builds = stats.builds_applied,
        version = stats.final_version,
        "WAL replay complete"
    );
    Ok(stats)
}
