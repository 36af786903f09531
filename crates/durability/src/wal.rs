//! Write-ahead log
//!
//! Every committed transaction is appended as a `BeginTxn` entry, one entry
//! per row-level change, and a closing `CommitTxn` entry carrying the commit
//! version. Recovery only applies transactions whose `CommitTxn` made it to
//! disk, so a crash mid-append loses at most the transaction being written.
//!
//! ## Durability Modes
//!
//! - `Always` - fsync after every committed transaction
//! - `Standard` - flush every transaction to the OS, fsync every 100 ms or
//!   every 64 transactions, whichever comes first, and on drop
//!
//! ## Failed Appends
//!
//! A transaction whose append fails is cut back out of the file before the
//! error is returned, so the log never holds a transaction the store did not
//! apply. If that cut fails too, the log is poisoned and refuses every later
//! append until it is reopened.
//!
//! ## File Layout
//!
//! A single append-only file of framed entries (see [`crate::encoding`]).

use crate::encoding::{decode_entry, encode_entry};
use buildseq_core::{BuildRecord, Error, Result, SeriesKey, SeriesRecord};
use buildseq_storage::WriteBatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Maximum time between fsyncs in `Standard` mode
pub const STANDARD_FSYNC_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum committed transactions between fsyncs in `Standard` mode
pub const STANDARD_FSYNC_BATCH: u32 = 64;

/// One record in the write-ahead log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalEntry {
    /// Start of a committed transaction
    BeginTxn {
        /// Transaction id
        txn_id: u64,
        /// Series the transaction is scoped to
        series: SeriesKey,
        /// Wall-clock time the commit was written
        timestamp: DateTime<Utc>,
    },

    /// A series row was created
    SeriesCreated {
        /// Transaction id
        txn_id: u64,
        /// The new row, ids and timestamp included
        record: SeriesRecord,
    },

    /// A build row was created
    BuildCreated {
        /// Transaction id
        txn_id: u64,
        /// Series the build is filed under
        series: SeriesKey,
        /// The new row, ids and timestamp included
        build: BuildRecord,
    },

    /// An empty series was deleted
    SeriesDeleted {
        /// Transaction id
        txn_id: u64,
        /// Deleted series
        series: SeriesKey,
    },

    /// End of a committed transaction
    CommitTxn {
        /// Transaction id
        txn_id: u64,
        /// Commit version assigned to the transaction
        version: u64,
    },
}

impl WalEntry {
    /// Transaction id of the entry
    pub fn txn_id(&self) -> u64 {
        match self {
            WalEntry::BeginTxn { txn_id, .. }
            | WalEntry::SeriesCreated { txn_id, .. }
            | WalEntry::BuildCreated { txn_id, .. }
            | WalEntry::SeriesDeleted { txn_id, .. }
            | WalEntry::CommitTxn { txn_id, .. } => *txn_id,
        }
    }

    /// True for `BeginTxn` and `CommitTxn`
    pub fn is_txn_boundary(&self) -> bool {
        matches!(self, WalEntry::BeginTxn { .. } | WalEntry::CommitTxn { .. })
    }

    /// Entries describing one committed batch, boundaries included
    pub fn for_batch(txn_id: u64, version: u64, batch: &WriteBatch) -> Vec<WalEntry> {
        let mut entries = Vec::with_capacity(batch.len() + 2);
        entries.push(WalEntry::BeginTxn {
            txn_id,
            series: batch.series,
            timestamp: Utc::now(),
        });
        if let Some(record) = &batch.create_series {
            entries.push(WalEntry::SeriesCreated {
                txn_id,
                record: record.clone(),
            });
        }
        for build in &batch.builds {
            entries.push(WalEntry::BuildCreated {
                txn_id,
                series: batch.series,
                build: build.clone(),
            });
        }
        if batch.delete_series {
            entries.push(WalEntry::SeriesDeleted {
                txn_id,
                series: batch.series,
            });
        }
        entries.push(WalEntry::CommitTxn { txn_id, version });
        entries
    }
}

/// When the WAL forces data to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurabilityMode {
    /// fsync after every committed transaction
    Always,
    /// fsync every 100 ms or 64 transactions, and on drop
    #[default]
    Standard,
}

impl DurabilityMode {
    /// Name used in the config file
    pub fn as_str(&self) -> &'static str {
        match self {
            DurabilityMode::Always => "always",
            DurabilityMode::Standard => "standard",
        }
    }
}

impl fmt::Display for DurabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DurabilityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "always" => Ok(DurabilityMode::Always),
            "standard" => Ok(DurabilityMode::Standard),
            other => Err(Error::invalid_input(format!(
                "unknown durability mode '{}', expected 'always' or 'standard'",
                other
            ))),
        }
    }
}

/// How a WAL read ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalTail {
    /// Every byte decoded
    Clean,
    /// The file ends inside an entry (crash mid-write)
    Torn {
        /// Offset where the incomplete entry starts
        offset: u64,
        /// Bytes of the incomplete entry
        bytes: u64,
    },
    /// An entry failed its checksum or could not be decoded
    Corrupt {
        /// Offset of the bad entry
        offset: u64,
        /// Decoder message
        reason: String,
    },
}

impl WalTail {
    /// True unless the read hit a corrupt entry
    pub fn is_intact(&self) -> bool {
        !matches!(self, WalTail::Corrupt { .. })
    }
}

/// Result of reading a WAL file front to back
#[derive(Debug, Clone)]
pub struct WalContents {
    /// Entries decoded before the read stopped
    pub entries: Vec<WalEntry>,
    /// Length of the decodable prefix in bytes
    pub valid_len: u64,
    /// Why the read stopped
    pub tail: WalTail,
}

/// Append-only write-ahead log file
///
/// Not internally synchronized; the database keeps it behind a mutex and the
/// commit path holds that mutex for the whole transaction append.
///
/// # Example
///
/// ```ignore
/// let mut wal = WAL::open("data/wal/buildseq.wal", DurabilityMode::Always)?;
/// wal.append_transaction(txn_id, version, &batch)?;
/// let contents = wal.read_all()?;
/// ```
pub struct WAL {
    path: PathBuf,
    writer: BufWriter<File>,
    size: u64,
    durability_mode: DurabilityMode,
    last_fsync: Instant,
    commits_since_fsync: u32,
    poisoned: bool,
    #[cfg(test)]
    faults: Faults,
}

/// Failures injected by tests
#[cfg(test)]
#[derive(Debug, Default)]
struct Faults {
    /// Fail writing the entry at this index of a transaction
    write_at: Option<usize>,
    /// Fail every fsync after the flush succeeded
    fsync: bool,
    /// Fail cutting a failed transaction back out
    rollback: bool,
}

impl WAL {
    /// Open an existing WAL or create a new one
    ///
    /// Creates parent directories if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P, durability_mode: DurabilityMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        let size = file.metadata()?.len();
        debug!(target: "buildseq::wal", path = %path.display(), size, %durability_mode, "Opened WAL");

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            size,
            durability_mode,
            last_fsync: Instant::now(),
            commits_since_fsync: 0,
            poisoned: false,
            #[cfg(test)]
            faults: Faults::default(),
        })
    }

    /// Append a single entry without any durability handling
    ///
    /// Returns the offset the entry was written at.
    pub fn append(&mut self, entry: &WalEntry) -> Result<u64> {
        self.check_poisoned()?;
        let offset = self.size;
        let encoded = encode_entry(entry)?;
        self.writer.write_all(&encoded).map_err(|e| {
            Error::storage(format!("failed to write WAL entry at offset {}: {}", offset, e))
        })?;
        self.size += encoded.len() as u64;
        Ok(offset)
    }

    /// Append a committed batch and apply the durability mode
    ///
    /// Returns the offset of the transaction's `BeginTxn` entry. On error the
    /// file is cut back to that offset, so the failed transaction cannot be
    /// replayed later.
    pub fn append_transaction(
        &mut self,
        txn_id: u64,
        version: u64,
        batch: &WriteBatch,
    ) -> Result<u64> {
        self.check_poisoned()?;
        let start = self.size;
        let Err(e) = self.write_transaction(txn_id, version, batch) else {
            return Ok(start);
        };

        match self.rollback(start) {
            Ok(()) => warn!(
                target: "buildseq::wal",
                txn_id,
                offset = start,
                error = %e,
                "Rolled back failed WAL append"
            ),
            Err(rollback) => {
                self.poisoned = true;
                error!(
                    target: "buildseq::wal",
                    path = %self.path.display(),
                    txn_id,
                    offset = start,
                    error = %e,
                    rollback_error = %rollback,
                    "WAL rollback failed; refusing further appends until reopen"
                );
            }
        }
        Err(e)
    }

    fn write_transaction(&mut self, txn_id: u64, version: u64, batch: &WriteBatch) -> Result<()> {
        for (_index, entry) in WalEntry::for_batch(txn_id, version, batch).iter().enumerate() {
            #[cfg(test)]
            if self.faults.write_at == Some(_index) {
                return Err(Error::storage("injected WAL write failure"));
            }
            self.append(entry)?;
        }

        match self.durability_mode {
            DurabilityMode::Always => self.fsync(),
            DurabilityMode::Standard => {
                self.flush()?;
                self.commits_since_fsync += 1;
                if self.commits_since_fsync >= STANDARD_FSYNC_BATCH
                    || self.last_fsync.elapsed() >= STANDARD_FSYNC_INTERVAL
                {
                    self.fsync()?;
                }
                Ok(())
            }
        }
    }

    /// Drop anything still buffered and cut the file back to `start`
    fn rollback(&mut self, start: u64) -> Result<()> {
        let file = self.writer.get_ref().try_clone()?;
        // into_parts hands back the buffer instead of flushing it on drop
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        let (_, _unwritten) = stale.into_parts();

        #[cfg(test)]
        if self.faults.rollback {
            return Err(Error::storage("injected WAL rollback failure"));
        }
        self.writer.get_ref().set_len(start)?;
        self.writer.get_ref().sync_all()?;
        self.size = start;
        Ok(())
    }

    fn check_poisoned(&self) -> Result<()> {
        if self.poisoned {
            return Err(Error::storage(format!(
                "WAL {} is poisoned by a failed rollback; reopen the database",
                self.path.display()
            )));
        }
        Ok(())
    }

    /// True once a failed append could not be rolled back
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Flush buffered writes to OS buffers
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::storage(format!("failed to flush WAL: {}", e)))
    }

    /// Flush and fsync to disk
    pub fn fsync(&mut self) -> Result<()> {
        self.flush()?;
        #[cfg(test)]
        if self.faults.fsync {
            return Err(Error::storage("injected WAL fsync failure"));
        }
        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| Error::storage(format!("failed to fsync WAL: {}", e)))?;
        self.last_fsync = Instant::now();
        self.commits_since_fsync = 0;
        Ok(())
    }

    /// Read every decodable entry from the start of the file
    ///
    /// Stops at the first incomplete or corrupt entry and reports which one
    /// in [`WalContents::tail`]. Only I/O failures are returned as errors.
    pub fn read_all(&mut self) -> Result<WalContents> {
        self.flush()?;
        let buf = std::fs::read(&self.path)?;

        let mut entries = Vec::new();
        let mut offset = 0usize;
        let tail = loop {
            if offset == buf.len() {
                break WalTail::Clean;
            }
            match decode_entry(&buf[offset..], offset as u64) {
                Ok((entry, consumed)) => {
                    entries.push(entry);
                    offset += consumed;
                }
                Err(Error::IncompleteEntry { .. }) => {
                    break WalTail::Torn {
                        offset: offset as u64,
                        bytes: (buf.len() - offset) as u64,
                    };
                }
                Err(e) => {
                    break WalTail::Corrupt {
                        offset: offset as u64,
                        reason: e.to_string(),
                    };
                }
            }
        };

        Ok(WalContents {
            entries,
            valid_len: offset as u64,
            tail,
        })
    }

    /// Cut the file back to `len` bytes
    ///
    /// The removed bytes are copied to `<wal>.discarded` first so a damaged
    /// log can still be inspected.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.flush()?;
        if len >= self.size {
            return Ok(());
        }

        let buf = std::fs::read(&self.path)?;
        let start = usize::try_from(len).map_err(|_| Error::internal("WAL offset overflow"))?;
        let discarded_path = self.discarded_path();
        std::fs::write(&discarded_path, buf.get(start..).unwrap_or_default())?;

        self.writer.get_ref().set_len(len)?;
        self.writer.get_ref().sync_all()?;
        warn!(
            target: "buildseq::wal",
            path = %self.path.display(),
            kept = len,
            discarded = self.size - len,
            copy = %discarded_path.display(),
            "Truncated WAL"
        );
        self.size = len;
        Ok(())
    }

    fn discarded_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".discarded");
        PathBuf::from(name)
    }

    /// Current file size (offset of the next write)
    pub fn size(&self) -> u64 {
        self.size
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durability mode
    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}

impl Drop for WAL {
    fn drop(&mut self) {
        if self.poisoned {
            return;
        }
        if let Err(e) = self.fsync() {
            warn!(target: "buildseq::wal", error = %e, "Final WAL fsync failed");
        }
    }
}
