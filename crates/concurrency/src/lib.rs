//! Concurrency layer for buildseq
//!
//! This crate implements optimistic concurrency control (OCC) scoped to one
//! series per transaction:
//! - TransactionContext: read set (series version) and buffered writes
//! - Validation: conflict detection at commit time
//! - TransactionManager: per-series commit locks, version and id allocation,
//!   WAL-before-store commit sequence
//!
//! Writes never touch the store before commit, so dropping a transaction is
//! a rollback.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::{CommitReceipt, TransactionManager};
pub use transaction::{CommitError, PendingBuild, PendingOperations, TransactionContext, TransactionStatus};
pub use validation::{validate_transaction, ConflictType, ValidationResult};
