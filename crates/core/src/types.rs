//! Core domain types: series identity, surrogate ids, build numbers, records

use crate::limits::MAX_BUILD_NUMBER;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a release series: the (major, minor) version pair.
///
/// Ordered by major first, then minor, so `1.9 < 1.10 < 2.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    /// Major version component
    pub major: u32,
    /// Minor version component
    pub minor: u32,
}

impl SeriesKey {
    /// Create a series key
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Surrogate identifier of a series row.
///
/// Assigned by the store in commit order, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesId(pub u64);

impl SeriesId {
    /// Raw numeric value
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Surrogate identifier of a build row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildId(pub u64);

impl BuildId {
    /// Raw numeric value
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A build number within a series: 1..=65535.
///
/// Zero is never a valid build number; the first build of a series is 1.
/// Arithmetic is checked: [`BuildNumber::next`] returns `None` at the ceiling
/// instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct BuildNumber(u16);

impl BuildNumber {
    /// The first build number of every series
    pub const FIRST: BuildNumber = BuildNumber(1);

    /// The highest build number a series can hold
    pub const MAX: BuildNumber = BuildNumber(MAX_BUILD_NUMBER);

    /// Create a build number, rejecting zero
    pub const fn new(value: u16) -> Option<Self> {
        if value == 0 {
            None
        } else {
            Some(BuildNumber(value))
        }
    }

    /// Raw numeric value
    pub const fn get(self) -> u16 {
        self.0
    }

    /// The number following this one, or `None` past [`BuildNumber::MAX`]
    pub fn next(self) -> Option<BuildNumber> {
        self.0.checked_add(1).map(BuildNumber)
    }

    /// The number allocated after `current_max` (1 for an empty series)
    pub fn successor_of(current_max: Option<BuildNumber>) -> Option<BuildNumber> {
        match current_max {
            Some(max) => max.next(),
            None => Some(BuildNumber::FIRST),
        }
    }
}

impl TryFrom<u16> for BuildNumber {
    type Error = String;

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        BuildNumber::new(value).ok_or_else(|| "build number 0 is not valid".to_string())
    }
}

impl From<BuildNumber> for u16 {
    fn from(n: BuildNumber) -> u16 {
        n.0
    }
}

impl fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted series row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRecord {
    /// Surrogate id
    pub id: SeriesId,
    /// (major, minor) identity
    pub key: SeriesKey,
    /// Commit time of the transaction that created the series
    pub created_on: DateTime<Utc>,
}

/// Persisted build row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Surrogate id
    pub id: BuildId,
    /// Owning series
    pub series_id: SeriesId,
    /// Opaque commit identifier
    pub commit: String,
    /// Build number within the series
    pub build_number: BuildNumber,
    /// Commit time of the transaction that allocated the build
    pub created_on: DateTime<Utc>,
}

/// A value read from storage together with the version of its series
///
/// The version changes every time a transaction commits writes to the
/// series, which is what commit-time validation compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The value
    pub value: T,
    /// Series version at read time
    pub version: u64,
}

impl<T> Versioned<T> {
    /// Wrap a value with its version
    pub fn new(value: T, version: u64) -> Self {
        Self { value, version }
    }

    /// Transform the value, keeping the version
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            value: f(self.value),
            version: self.version,
        }
    }

    /// Drop the version
    pub fn into_value(self) -> T {
        self.value
    }
}
