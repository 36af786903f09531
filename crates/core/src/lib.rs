//! Core types and traits for buildseq
//!
//! This crate defines the foundational types used throughout the system:
//! - SeriesKey: (major, minor) identity of a release series
//! - SeriesId / BuildId: surrogate identifiers assigned by the store
//! - BuildNumber: 16-bit, per-series, gap-free build counter
//! - SeriesRecord / BuildRecord: persisted rows
//! - Error: Error type hierarchy
//! - Traits: read-side storage abstraction (Storage)
//! - Limits: build number ceiling and commit length bounds

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use limits::{
    DEFAULT_MIN_COMMIT_LENGTH, MAX_BUILD_NUMBER, MAX_COMMIT_LENGTH, SHORT_MIN_COMMIT_LENGTH,
};
pub use traits::Storage;
pub use types::{
    BuildId, BuildNumber, BuildRecord, SeriesId, SeriesKey, SeriesRecord, Versioned,
};
