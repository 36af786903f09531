//! Durability layer for buildseq
//!
//! This crate handles everything that touches disk:
//!
//! - WAL: append-only log of committed transactions, one framed entry per
//!   row-level change plus transaction boundaries
//! - Durability modes: Always, Standard (default)
//! - Recovery: replay of committed transactions into a `LedgerStore`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding; // Entry framing: length, type tag, bincode payload, CRC32
pub mod recovery; // WAL replay logic
pub mod wal; // WAL file, entries, durability modes

pub use recovery::{replay_wal, ReplayStats};
pub use wal::{DurabilityMode, WalContents, WalEntry, WalTail, WAL};
