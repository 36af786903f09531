//! Transaction validation for OCC
//!
//! Rules:
//! - First committer wins, judged on the series version in the read set
//! - A transaction that never read the series has no version to validate;
//!   the store's own constraint checks still apply to its writes
//! - Buffered series creations and build inserts are checked against rows
//!   committed since the transaction read, so callers can tell a lost race
//!   for the *same* commit apart from a plain version bump

use crate::transaction::TransactionContext;
use buildseq_core::{BuildRecord, Result, SeriesKey, Storage};

/// Types of conflicts that can occur during transaction validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// The series changed since the transaction read it
    SeriesVersion {
        /// Series that changed
        series: SeriesKey,
        /// Version recorded in the read set
        read_version: u64,
        /// Version at validation time
        current_version: u64,
    },

    /// The transaction creates a series that another transaction created first
    SeriesExists {
        /// Series that now exists
        series: SeriesKey,
    },

    /// The transaction inserts a commit that another transaction inserted first
    CommitExists {
        /// Series of the commit
        series: SeriesKey,
        /// The winner's build row
        existing: BuildRecord,
    },
}

/// Result of transaction validation
///
/// Accumulates all conflicts found during validation.
/// A transaction commits only if `is_valid()` returns true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Successful validation (no conflicts)
    pub fn ok() -> Self {
        ValidationResult {
            conflicts: Vec::new(),
        }
    }

    /// Validation result with a single conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        ValidationResult {
            conflicts: vec![conflict],
        }
    }

    /// True if validation passed
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Merge another validation result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// The winner's row if a buffered commit was inserted concurrently
    pub fn existing_build(&self) -> Option<&BuildRecord> {
        self.conflicts.iter().find_map(|c| match c {
            ConflictType::CommitExists { existing, .. } => Some(existing),
            _ => None,
        })
    }
}

/// Validate a transaction against the current store state
///
/// Must run under the series' commit lock so the result stays true until
/// the batch is applied.
pub fn validate_transaction<S: Storage>(
    txn: &TransactionContext,
    store: &S,
) -> Result<ValidationResult> {
    let mut result = ValidationResult::ok();

    if let Some(read_version) = txn.read_version() {
        let current_version = store.series_version(&txn.series)?;
        if current_version != read_version {
            result.merge(ValidationResult::conflict(ConflictType::SeriesVersion {
                series: txn.series,
                read_version,
                current_version,
            }));
        }
    }

    if txn.creates_series() && store.get_series(&txn.series)?.value.is_some() {
        result.merge(ValidationResult::conflict(ConflictType::SeriesExists {
            series: txn.series,
        }));
    }

    for pending in txn.pending_builds() {
        if let Some(existing) = store.get_build(&txn.series, &pending.commit)?.value {
            result.merge(ValidationResult::conflict(ConflictType::CommitExists {
                series: txn.series,
                existing,
            }));
        }
    }

    Ok(result)
}
