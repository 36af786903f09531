//! Sharded Series/Build store
//!
//! One shard per series, held in a DashMap. Reads take the shard's read
//! guard; batches take the entry's write guard, so a batch is applied
//! atomically with respect to readers of the same series and never blocks
//! readers or writers of other series for longer than a map bucket lock.
//!
//! # Design
//!
//! - DashMap: sharded by SeriesKey, no cross-series contention
//! - FxHashMap inside each shard: O(1) commit and build-number lookups
//! - Versions: each shard carries the commit version of the last batch that
//!   touched it; absent series have version 0
//! - Surrogate ids: handed out by atomic counters, resumed past the maximum
//!   seen when batches are replayed

use buildseq_core::{
    BuildId, BuildNumber, BuildRecord, Error, Result, SeriesId, SeriesKey, SeriesRecord, Storage,
    Versioned,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

use crate::batch::WriteBatch;
use crate::shard::SeriesShard;

/// In-memory Series/Build tables
///
/// # Thread Safety
///
/// All operations are thread-safe. Batches for different series proceed in
/// parallel; batches for the same series are applied one at a time.
///
/// # Example
///
/// ```ignore
/// use buildseq_storage::LedgerStore;
/// use std::sync::Arc;
///
/// let store = Arc::new(LedgerStore::new());
/// store.apply_batch(&batch, 1)?;
/// ```
pub struct LedgerStore {
    shards: DashMap<SeriesKey, SeriesShard>,
    /// Highest commit version applied
    version: AtomicU64,
    /// Next series id to hand out
    next_series_id: AtomicU64,
    /// Next build id to hand out
    next_build_id: AtomicU64,
}

impl LedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with expected number of series
    pub fn with_capacity(num_series: usize) -> Self {
        Self {
            shards: DashMap::with_capacity(num_series),
            version: AtomicU64::new(0),
            next_series_id: AtomicU64::new(1),
            next_build_id: AtomicU64::new(1),
        }
    }

    /// Highest commit version applied
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Raise the version (used during recovery)
    pub fn set_version(&self, version: u64) {
        self.version.fetch_max(version, Ordering::AcqRel);
    }

    /// Reserve the next series id
    pub fn allocate_series_id(&self) -> SeriesId {
        SeriesId(self.next_series_id.fetch_add(1, Ordering::AcqRel))
    }

    /// Reserve the next build id
    pub fn allocate_build_id(&self) -> BuildId {
        BuildId(self.next_build_id.fetch_add(1, Ordering::AcqRel))
    }

    /// Number of series
    pub fn series_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of builds across all series
    pub fn build_count(&self) -> usize {
        self.shards.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of builds in one series (0 if unknown)
    pub fn build_count_in(&self, key: &SeriesKey) -> usize {
        self.shards.get(key).map(|shard| shard.len()).unwrap_or(0)
    }

    /// True if the series exists
    pub fn contains_series(&self, key: &SeriesKey) -> bool {
        self.shards.contains_key(key)
    }

    /// All series rows ordered by (major, minor)
    pub fn all_series(&self) -> Vec<SeriesRecord> {
        let mut records: Vec<SeriesRecord> = self
            .shards
            .iter()
            .map(|entry| entry.value().record().clone())
            .collect();
        records.sort_by_key(|r| r.key);
        records
    }

    // ========================================================================
    // Batches
    // ========================================================================

    /// Check a batch against every store constraint without applying it
    pub fn check_batch(&self, batch: &WriteBatch) -> Result<()> {
        let shard = self.shards.get(&batch.series);
        check_against(shard.as_deref(), batch)
    }

    /// Apply a batch atomically, stamping the series with `version`
    ///
    /// The batch is checked under the series' entry lock; on error nothing
    /// is modified.
    pub fn apply_batch(&self, batch: &WriteBatch, version: u64) -> Result<()> {
        match self.shards.entry(batch.series) {
            Entry::Occupied(mut occupied) => {
                check_against(Some(occupied.get()), batch)?;
                if batch.delete_series {
                    occupied.remove();
                } else {
                    occupied.get_mut().insert_builds(&batch.builds, version)?;
                }
            }
            Entry::Vacant(vacant) => {
                check_against(None, batch)?;
                if let Some(record) = &batch.create_series {
                    let mut shard = SeriesShard::new(record.clone(), version);
                    shard.insert_builds(&batch.builds, version)?;
                    vacant.insert(shard);
                    self.next_series_id
                        .fetch_max(record.id.as_u64() + 1, Ordering::AcqRel);
                }
            }
        }

        if let Some(max_id) = batch.builds.iter().map(|b| b.id.as_u64()).max() {
            self.next_build_id.fetch_max(max_id + 1, Ordering::AcqRel);
        }
        self.version.fetch_max(version, Ordering::AcqRel);
        trace!(
            target: "buildseq::storage",
            series = %batch.series,
            rows = batch.len(),
            version,
            "Applied batch"
        );
        Ok(())
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Constraint check for a batch against the current shard of its series
fn check_against(shard: Option<&SeriesShard>, batch: &WriteBatch) -> Result<()> {
    if batch.delete_series && (batch.create_series.is_some() || !batch.builds.is_empty()) {
        return Err(Error::invalid_input(
            "a batch cannot delete a series and write to it",
        ));
    }

    if let Some(record) = &batch.create_series {
        if record.key != batch.series {
            return Err(Error::invalid_input(format!(
                "series row {} filed under batch for {}",
                record.key, batch.series
            )));
        }
        if shard.is_some() {
            return Err(Error::DuplicateSeries(batch.series));
        }
        let fresh = SeriesShard::new(record.clone(), 0);
        return fresh.check_builds(&batch.builds);
    }

    match shard {
        Some(shard) if batch.delete_series => {
            if shard.is_empty() {
                Ok(())
            } else {
                Err(Error::SeriesProtected {
                    series: batch.series,
                    builds: shard.len(),
                })
            }
        }
        Some(shard) => shard.check_builds(&batch.builds),
        None if batch.delete_series => Err(Error::SeriesNotFound(batch.series)),
        None => match batch.builds.first() {
            Some(build) => Err(Error::DanglingBuild(build.series_id)),
            None => Ok(()),
        },
    }
}

impl Storage for LedgerStore {
    fn get_series(&self, key: &SeriesKey) -> Result<Versioned<Option<SeriesRecord>>> {
        Ok(match self.shards.get(key) {
            Some(shard) => Versioned::new(Some(shard.record().clone()), shard.version()),
            None => Versioned::new(None, 0),
        })
    }

    fn get_build(&self, key: &SeriesKey, commit: &str) -> Result<Versioned<Option<BuildRecord>>> {
        Ok(match self.shards.get(key) {
            Some(shard) => {
                Versioned::new(shard.build_for_commit(commit).cloned(), shard.version())
            }
            None => Versioned::new(None, 0),
        })
    }

    fn max_build_number(&self, key: &SeriesKey) -> Result<Versioned<Option<BuildNumber>>> {
        Ok(match self.shards.get(key) {
            Some(shard) => Versioned::new(shard.max_build_number(), shard.version()),
            None => Versioned::new(None, 0),
        })
    }

    fn list_builds(&self, key: &SeriesKey) -> Result<Option<(SeriesRecord, Vec<BuildRecord>)>> {
        Ok(self
            .shards
            .get(key)
            .map(|shard| (shard.record().clone(), shard.sorted_builds())))
    }

    fn series_version(&self, key: &SeriesKey) -> Result<u64> {
        Ok(self.shards.get(key).map(|shard| shard.version()).unwrap_or(0))
    }

    fn current_version(&self) -> u64 {
        self.version()
    }
}
