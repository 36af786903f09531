//! Database engine for buildseq
//!
//! This crate orchestrates the lower layers:
//! - Database: open/ephemeral lifecycle, data-dir lock, config file,
//!   recovery, transaction API with retry
//! - TransactionCoordinator: transaction metrics around the commit path
//! - Allocator: find-or-create of series and gap-free build numbers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod allocator;
pub mod coordinator;
pub mod database;

pub use allocator::{Allocation, AllocationOutcome, Allocator, SeriesListing};
pub use coordinator::{TransactionCoordinator, TransactionMetrics};
pub use database::{BuildSeqConfig, Database, RetryConfig, CONFIG_FILE_NAME};
