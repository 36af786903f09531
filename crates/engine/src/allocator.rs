//! Build number allocation
//!
//! `allocate` is find-or-create over two tables, run as one optimistic
//! transaction per attempt:
//!
//! ```text
//! 1. read series            absent → buffer its creation
//! 2. read build for commit  present → AlreadyKnown
//! 3. next = max + 1         past 65535 → Overflow, nothing committed
//! 4. buffer build, commit   same commit won the race → Conflict (winner's row)
//!                           series moved on → retry from 1
//! ```
//!
//! Attempts on one series hold that series' allocation lock from step 1 to
//! step 4, so allocators never race each other and distinct commits are
//! never retried. Validation at commit still catches writers that bypass the
//! allocator. Numbers come from the committed maximum, so within a series
//! they are dense and follow commit order.

use crate::database::Database;
use buildseq_concurrency::{CommitError, TransactionContext};
use buildseq_core::{
    BuildNumber, BuildRecord, Error, Result, SeriesKey, SeriesRecord, Storage,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How an allocation request was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationOutcome {
    /// A new build row was committed
    Created,
    /// The commit already had a number in this series
    AlreadyKnown,
    /// A concurrent request inserted the same commit first
    Conflict,
}

/// Result of `allocate` or `lookup`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// How the request was resolved
    pub outcome: AllocationOutcome,
    /// The series row
    pub series: SeriesRecord,
    /// The build row (the winner's row for `Conflict`)
    pub build: BuildRecord,
    /// True if this request created the series
    pub series_created: bool,
}

impl Allocation {
    /// The build number
    pub fn build_number(&self) -> BuildNumber {
        self.build.build_number
    }
}

/// A series with all of its builds, ordered by build number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesListing {
    /// The series row
    pub series: SeriesRecord,
    /// Builds, ascending by number
    pub builds: Vec<BuildRecord>,
}

enum Attempt {
    Done(Allocation),
    Retry,
}

/// Steps 1-3 of an attempt
enum Prepared {
    /// The commit already has a number
    Known(Allocation),
    /// A build is buffered in the transaction, ready to commit
    Pending {
        current: Option<SeriesRecord>,
        series_created: bool,
    },
}

/// Allocates, looks up and lists build numbers
///
/// Cheap to clone; every clone shares the same database.
#[derive(Clone)]
pub struct Allocator {
    db: Arc<Database>,
}

impl Allocator {
    /// Create an allocator over `db`
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The underlying database
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Return the build number of `commit` in `series`, allocating one if needed
    ///
    /// Unknown series are created on the fly. Conflicts with writers outside
    /// the allocator are retried with the database's `RetryConfig`.
    ///
    /// # Errors
    ///
    /// - `Overflow` if the series already holds build 65535
    /// - `RetriesExhausted` if every retry lost to a concurrent commit
    /// - store and WAL failures
    pub fn allocate(&self, series: SeriesKey, commit: &str) -> Result<Allocation> {
        self.db.check_accepting()?;
        let retry = self.db.retry_config();

        let mut attempt = 0;
        loop {
            match self.attempt(series, commit) {
                Ok(Attempt::Done(allocation)) => return Ok(allocation),
                Ok(Attempt::Retry) => {}
                Err(e) if e.is_conflict() => {}
                Err(e) => return Err(e),
            }

            if attempt >= retry.max_retries {
                warn!(target: "buildseq::alloc", %series, commit, attempts = attempt + 1, "Allocation gave up after conflicts");
                return Err(Error::RetriesExhausted {
                    series,
                    attempts: attempt + 1,
                });
            }
            warn!(target: "buildseq::alloc", %series, commit, attempt, "Allocation conflicted, retrying");
            std::thread::sleep(retry.calculate_delay(attempt));
            attempt += 1;
        }
    }

    fn attempt(&self, series: SeriesKey, commit: &str) -> Result<Attempt> {
        let lock = self.db.allocation_lock(series);
        let _serialized = lock.lock();

        let mut txn = self.db.begin_transaction(series);
        let result = match self.prepare(&mut txn, series, commit) {
            Ok(Prepared::Known(allocation)) => Ok(Attempt::Done(allocation)),
            Ok(Prepared::Pending {
                current,
                series_created,
            }) => self.finish(&mut txn, series, commit, current, series_created),
            Err(e) => Err(e),
        };
        self.db.end_transaction(txn);
        result
    }

    fn prepare(
        &self,
        txn: &mut TransactionContext,
        series: SeriesKey,
        commit: &str,
    ) -> Result<Prepared> {
        let store = self.db.storage().as_ref();

        let current = txn.get_series(store)?;
        match &current {
            Some(record) => {
                if let Some(build) = txn.get_build(store, commit)? {
                    // Build rows never change, so a stale read set does not
                    // invalidate the row we found
                    if let Err(e) = self.db.commit_transaction(txn) {
                        debug!(target: "buildseq::alloc", %series, error = %e, "Read-only commit failed");
                    }
                    debug!(target: "buildseq::alloc", %series, commit, build_number = %build.build_number, "Commit already allocated");
                    return Ok(Prepared::Known(Allocation {
                        outcome: AllocationOutcome::AlreadyKnown,
                        series: record.clone(),
                        build,
                        series_created: false,
                    }));
                }
            }
            None => txn.create_series(store)?,
        }
        let series_created = current.is_none();

        let next = match BuildNumber::successor_of(txn.max_build_number(store)?) {
            Some(next) => next,
            None => {
                error!(target: "buildseq::alloc", %series, commit, "Build number would exceed protocol version bits");
                return Err(Error::Overflow(series));
            }
        };
        txn.insert_build(store, commit, next)?;
        Ok(Prepared::Pending {
            current,
            series_created,
        })
    }

    fn finish(
        &self,
        txn: &mut TransactionContext,
        series: SeriesKey,
        commit: &str,
        current: Option<SeriesRecord>,
        series_created: bool,
    ) -> Result<Attempt> {
        match self.db.commit_transaction(txn) {
            Ok(receipt) => {
                let series_record = receipt
                    .created_series()
                    .cloned()
                    .or(current)
                    .ok_or_else(|| Error::internal("committed build without a series row"))?;
                let build = receipt
                    .created_builds()
                    .first()
                    .cloned()
                    .ok_or_else(|| Error::internal("commit receipt carries no build row"))?;

                if series_created {
                    info!(target: "buildseq::alloc", %series, series_id = %series_record.id, "Series created");
                }
                debug!(target: "buildseq::alloc", %series, commit, build_number = %build.build_number, "Build number allocated");
                Ok(Attempt::Done(Allocation {
                    outcome: AllocationOutcome::Created,
                    series: series_record,
                    build,
                    series_created,
                }))
            }
            Err(CommitError::ValidationFailed(validation)) => {
                let Some(winner) = validation.existing_build().cloned() else {
                    return Ok(Attempt::Retry);
                };
                let series_record = self
                    .db
                    .storage()
                    .get_series(&series)?
                    .value
                    .ok_or(Error::SeriesNotFound(series))?;
                warn!(target: "buildseq::alloc", %series, commit, build_number = %winner.build_number, "Commit inserted concurrently");
                Ok(Attempt::Done(Allocation {
                    outcome: AllocationOutcome::Conflict,
                    series: series_record,
                    build: winner,
                    series_created: false,
                }))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Find the build number of `commit` in `series` without allocating
    ///
    /// # Errors
    ///
    /// `SeriesNotFound` or `BuildNotFound`.
    pub fn lookup(&self, series: SeriesKey, commit: &str) -> Result<Allocation> {
        let store = self.db.storage();
        let record = store
            .get_series(&series)?
            .value
            .ok_or(Error::SeriesNotFound(series))?;
        let build = store
            .get_build(&series, commit)?
            .value
            .ok_or_else(|| Error::BuildNotFound {
                series,
                commit: commit.to_string(),
            })?;
        Ok(Allocation {
            outcome: AllocationOutcome::AlreadyKnown,
            series: record,
            build,
            series_created: false,
        })
    }

    /// All builds of `series`, ascending by number
    ///
    /// # Errors
    ///
    /// `SeriesNotFound` if the series was never allocated into.
    pub fn list_builds(&self, series: SeriesKey) -> Result<SeriesListing> {
        self.db
            .storage()
            .list_builds(&series)?
            .map(|(series, builds)| SeriesListing { series, builds })
            .ok_or(Error::SeriesNotFound(series))
    }
}
