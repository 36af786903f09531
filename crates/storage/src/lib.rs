//! Storage layer for buildseq
//!
//! This crate implements the in-memory Series/Build tables:
//! - LedgerStore: DashMap keyed by series, one shard per series
//! - SeriesShard: the series row, its builds, and two unique indices
//! - WriteBatch: the unit of mutation produced by a committed transaction
//!
//! # Constraints
//!
//! The store enforces its invariants itself, independently of the code that
//! produces batches:
//! - unique (major, minor)
//! - unique (series, commit) and unique (series, build number)
//! - builds must reference the series they are filed under
//! - a series that still has builds cannot be deleted

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod ledger;
pub mod shard;

pub use batch::WriteBatch;
pub use ledger::LedgerStore;
pub use shard::SeriesShard;
