//! Database struct and open/close logic
//!
//! This module provides the main Database struct that orchestrates:
//! - Data directory locking and the process-wide registry
//! - Config file loading
//! - WAL opening and replay on startup
//! - Transaction API
//!
//! ## Transaction API
//!
//! 1. **Closure API**: `db.transaction(series, |txn| { ... })`
//!    - Automatic commit on success, abort on error
//!    - Returns the closure's return value
//!
//! 2. **Manual API**: `begin_transaction()` + `commit_transaction()` + `end_transaction()`
//!    - For callers that need the commit receipt or the raw `CommitError`

pub mod config;
mod registry;
mod transactions;

pub use config::{BuildSeqConfig, CONFIG_FILE_NAME};
pub use registry::OPEN_DATABASES;
pub use transactions::RetryConfig;

use crate::coordinator::{TransactionCoordinator, TransactionMetrics};
use buildseq_concurrency::{CommitError, CommitReceipt, TransactionContext};
use buildseq_core::{Error, Result, SeriesKey};
use buildseq_durability::{replay_wal, DurabilityMode, ReplayStats, WAL};
use buildseq_storage::LedgerStore;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Directory under the data dir holding the log
const WAL_DIR: &str = "wal";
/// Log file name inside [`WAL_DIR`]
const WAL_FILE: &str = "buildseq.wal";
/// Exclusive lock file inside the data dir
const LOCK_FILE: &str = ".lock";
/// How long `shutdown` waits for in-flight transactions
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Main database struct
///
/// Owns the ledger, the WAL (disk databases only) and the transaction
/// coordinator. Shared through `Arc`; every method takes `&self`.
pub struct Database {
    /// Canonical data directory (empty for ephemeral databases)
    data_dir: PathBuf,
    storage: Arc<LedgerStore>,
    /// `None` for ephemeral databases
    wal: Option<Mutex<WAL>>,
    coordinator: TransactionCoordinator,
    config: RwLock<BuildSeqConfig>,
    /// What replay found on open (default for ephemeral databases)
    recovery: ReplayStats,
    accepting_transactions: AtomicBool,
    /// Per-series locks serializing allocation attempts
    allocation_locks: DashMap<SeriesKey, Arc<Mutex<()>>>,
    /// Held for the lifetime of the database; dropping it releases the lock
    _lock_file: Option<File>,
}

impl Database {
    /// Open a disk database at `path`
    ///
    /// Creates the directory and a default `buildseq.toml` if missing, then
    /// replays the WAL. Opening a path that is already open in this process
    /// returns the existing instance.
    ///
    /// # Errors
    ///
    /// - the config file is invalid
    /// - another process holds the directory lock
    /// - the WAL cannot be read or describes an invalid history
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>> {
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        BuildSeqConfig::write_default_if_missing(&config_path)?;
        let config = BuildSeqConfig::from_file(&config_path)?;
        Self::open_internal(data_dir, config)
    }

    /// Open a disk database with an explicit config
    ///
    /// The config is validated and written to `buildseq.toml`, replacing any
    /// existing file, so a later `open` sees the same settings.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: BuildSeqConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let data_dir = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        config.write_to_file(&data_dir.join(CONFIG_FILE_NAME))?;
        Self::open_internal(data_dir, config)
    }

    fn open_internal(data_dir: PathBuf, config: BuildSeqConfig) -> Result<Arc<Self>> {
        let durability_mode = config.durability_mode()?;
        let canonical_path = data_dir.canonicalize()?;

        // Held until the new instance is registered so two threads cannot
        // both open the same directory
        let mut registry = OPEN_DATABASES.lock();
        if let Some(db) = registry.get(&canonical_path).and_then(|weak| weak.upgrade()) {
            debug!(target: "buildseq::db", path = %canonical_path.display(), "Returning existing database instance");
            return Ok(db);
        }

        let lock_file = acquire_dir_lock(&canonical_path)?;

        let wal_path = canonical_path.join(WAL_DIR).join(WAL_FILE);
        let mut wal = WAL::open(&wal_path, durability_mode)?;
        let storage = LedgerStore::new();
        let recovery = replay_wal(&mut wal, &storage).map_err(|e| {
            error!(target: "buildseq::db", path = %wal_path.display(), error = %e, "WAL replay failed");
            e
        })?;

        info!(
            target: "buildseq::db",
            path = %canonical_path.display(),
            %durability_mode,
            txns = recovery.txns_applied,
            series = storage.series_count(),
            builds = storage.build_count(),
            version = recovery.final_version,
            clean = recovery.is_clean(),
            "Database opened"
        );

        let db = Arc::new(Self {
            data_dir: canonical_path.clone(),
            storage: Arc::new(storage),
            wal: Some(Mutex::new(wal)),
            coordinator: TransactionCoordinator::from_recovery(&recovery),
            config: RwLock::new(config),
            recovery,
            accepting_transactions: AtomicBool::new(true),
            allocation_locks: DashMap::new(),
            _lock_file: Some(lock_file),
        });
        registry.insert(canonical_path, Arc::downgrade(&db));
        Ok(db)
    }

    /// Create an in-memory database with the default config
    ///
    /// No files, no WAL, no lock; everything is lost on drop.
    pub fn ephemeral() -> Arc<Self> {
        Self::build_ephemeral(BuildSeqConfig::default())
    }

    /// Create an in-memory database with a caller-supplied config
    ///
    /// # Errors
    ///
    /// Returns an error if the config fails validation.
    pub fn ephemeral_with_config(config: BuildSeqConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Self::build_ephemeral(config))
    }

    fn build_ephemeral(config: BuildSeqConfig) -> Arc<Self> {
        Arc::new(Self {
            data_dir: PathBuf::new(),
            storage: Arc::new(LedgerStore::new()),
            wal: None,
            coordinator: TransactionCoordinator::new(0),
            config: RwLock::new(config),
            recovery: ReplayStats::default(),
            accepting_transactions: AtomicBool::new(true),
            allocation_locks: DashMap::new(),
            _lock_file: None,
        })
    }

    /// True for databases created with [`Database::ephemeral`]
    pub fn is_ephemeral(&self) -> bool {
        self.wal.is_none()
    }

    /// Canonical data directory (empty for ephemeral databases)
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The ledger backing this database
    pub fn storage(&self) -> &Arc<LedgerStore> {
        &self.storage
    }

    /// Snapshot of the current config
    pub fn config(&self) -> BuildSeqConfig {
        self.config.read().clone()
    }

    /// Retry policy from the config
    pub fn retry_config(&self) -> RetryConfig {
        self.config.read().retry.clone()
    }

    /// What WAL replay found when the database was opened
    pub fn recovery_stats(&self) -> &ReplayStats {
        &self.recovery
    }

    /// Durability mode of the WAL (`None` for ephemeral databases)
    pub fn durability_mode(&self) -> Option<DurabilityMode> {
        self.wal.as_ref().map(|wal| wal.lock().durability_mode())
    }

    /// Transaction metrics since open
    pub fn metrics(&self) -> TransactionMetrics {
        self.coordinator.metrics()
    }

    /// Current global commit version
    pub fn current_version(&self) -> u64 {
        self.coordinator.current_version()
    }

    /// False once `shutdown` has been called
    pub fn is_open(&self) -> bool {
        self.accepting_transactions.load(Ordering::SeqCst)
    }

    /// Fail with `InvalidInput` if the database is shutting down
    pub fn check_accepting(&self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::invalid_input("Database is shutting down"));
        }
        Ok(())
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Execute a transaction with the given closure
    ///
    /// Commits if the closure returns `Ok`, aborts if it returns `Err`.
    /// Conflicts are not retried; see [`Database::transaction_with_retry`].
    ///
    /// # Example
    /// ```text
    /// let number = db.transaction(series, |txn| {
    ///     txn.create_series(db.storage().as_ref())?;
    ///     txn.insert_build(db.storage().as_ref(), commit, BuildNumber::FIRST)?;
    ///     Ok(BuildNumber::FIRST)
    /// })?;
    /// ```
    pub fn transaction<F, T>(&self, series: SeriesKey, f: F) -> Result<T>
    where
        F: FnOnce(&mut TransactionContext) -> Result<T>,
    {
        self.check_accepting()?;
        let mut txn = self.begin_transaction(series);
        let result = f(&mut txn);
        let outcome = self.run_single_attempt(&mut txn, result);
        self.end_transaction(txn);
        outcome
    }

    /// Execute a transaction, retrying on conflict with exponential backoff
    ///
    /// The closure runs again on a fresh transaction after each conflict, up
    /// to `config.max_retries` times. Non-conflict errors are returned at once.
    pub fn transaction_with_retry<F, T>(&self, series: SeriesKey, config: &RetryConfig, f: F) -> Result<T>
    where
        F: Fn(&mut TransactionContext) -> Result<T>,
    {
        self.check_accepting()?;

        let mut attempt = 0;
        loop {
            let mut txn = self.begin_transaction(series);
            let result = f(&mut txn);
            let outcome = self.run_single_attempt(&mut txn, result);
            self.end_transaction(txn);

            match outcome {
                Err(e) if e.is_conflict() && attempt < config.max_retries => {
                    warn!(target: "buildseq::txn", %series, attempt, error = %e, "Retrying after conflict");
                    std::thread::sleep(config.calculate_delay(attempt));
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    fn run_single_attempt<T>(&self, txn: &mut TransactionContext, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.commit_transaction(txn)?;
                Ok(value)
            }
            Err(e) => {
                let _ = txn.mark_aborted(format!("Closure error: {}", e));
                self.coordinator.record_abort();
                Err(e)
            }
        }
    }

    /// Lock held by the allocator across one read-compute-commit attempt
    ///
    /// Separate from the commit lock the transaction manager takes inside
    /// `commit_transaction`, so holding it while committing cannot deadlock.
    pub fn allocation_lock(&self, series: SeriesKey) -> Arc<Mutex<()>> {
        Arc::clone(
            self.allocation_locks
                .entry(series)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Begin a new transaction on `series` (manual control)
    ///
    /// Must be finished with [`Database::end_transaction`] after committing
    /// or abandoning it.
    pub fn begin_transaction(&self, series: SeriesKey) -> TransactionContext {
        self.coordinator.start_transaction(series)
    }

    /// Commit a transaction
    ///
    /// Validation conflicts come back as `CommitError::ValidationFailed`
    /// with the full conflict list.
    pub fn commit_transaction(
        &self,
        txn: &mut TransactionContext,
    ) -> std::result::Result<CommitReceipt, CommitError> {
        self.coordinator
            .commit(txn, self.storage.as_ref(), self.wal.as_ref())
    }

    /// Finish a transaction
    ///
    /// A transaction that is still active is counted as aborted; its
    /// buffered writes are dropped with it.
    pub fn end_transaction(&self, txn: TransactionContext) {
        if txn.is_active() {
            self.coordinator.record_abort();
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Force buffered WAL entries to disk
    pub fn flush(&self) -> Result<()> {
        if let Some(wal) = &self.wal {
            wal.lock().fsync()?;
        }
        Ok(())
    }

    /// Stop accepting transactions, wait for in-flight ones, then flush
    ///
    /// Idempotent.
    pub fn shutdown(&self) -> Result<()> {
        self.accepting_transactions.store(false, Ordering::SeqCst);
        if !self.coordinator.wait_for_idle(SHUTDOWN_TIMEOUT) {
            warn!(
                target: "buildseq::db",
                active = self.coordinator.active_count(),
                "Shutdown timed out waiting for active transactions"
            );
        }
        self.flush()
    }
}

fn acquire_dir_lock(dir: &Path) -> Result<File> {
    let lock_path = dir.join(LOCK_FILE);
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_path)
        .map_err(|e| Error::storage(format!("failed to open lock file: {}", e)))?;
    fs2::FileExt::try_lock_exclusive(&lock_file).map_err(|_| {
        Error::storage(format!(
            "database at '{}' is already in use by another process",
            dir.display()
        ))
    })?;
    Ok(lock_file)
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(target: "buildseq::db", error = %e, "Final WAL flush failed");
        }

        if !self.is_ephemeral() {
            let mut registry = OPEN_DATABASES.lock();
            // A new instance may already have replaced our expired entry
            if registry
                .get(&self.data_dir)
                .is_some_and(|weak| weak.strong_count() == 0)
            {
                registry.remove(&self.data_dir);
            }
        }
    }
}
