//! Numeric limits shared by every layer
//!
//! Build numbers are embedded in a packed version word downstream, which
//! leaves exactly 16 bits for them. Commit identifiers are opaque strings whose
//! length is bounded on both sides.

/// Highest build number a series can ever hold.
pub const MAX_BUILD_NUMBER: u16 = u16::MAX;

/// Longest commit identifier accepted (column width of the build table).
pub const MAX_COMMIT_LENGTH: usize = 128;

/// Default minimum commit length: a full 40-character SHA-1 revision.
pub const DEFAULT_MIN_COMMIT_LENGTH: usize = 40;

/// Minimum commit length used by deployments that accept abbreviated hashes.
pub const SHORT_MIN_COMMIT_LENGTH: usize = 16;
