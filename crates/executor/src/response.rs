//! Response assembly.
//!
//! Field names match the JSON the service has always returned, so existing
//! CI scripts keep parsing it. Absent fields are omitted, not null.

use buildseq_core::{BuildRecord, SeriesRecord};
use buildseq_engine::{Allocation, AllocationOutcome, SeriesListing};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

const FOUND: &str = "Found";

/// One build in a series listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEntry {
    /// Commit identifier
    pub commit_hash: String,
    /// Assigned number
    pub build_number: u16,
    /// Allocation time
    pub build_created: DateTime<Utc>,
}

impl From<&BuildRecord> for BuildEntry {
    fn from(build: &BuildRecord) -> Self {
        Self {
            commit_hash: build.commit.clone(),
            build_number: build.build_number.get(),
            build_created: build.created_on,
        }
    }
}

/// The outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Status code
    pub status: u16,
    /// Human-readable outcome
    pub message: String,
    /// Series display form, e.g. `"1.4"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    /// Series surrogate id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<u64>,
    /// Series creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_created: Option<DateTime<Utc>>,
    /// Commit identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// Build number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u16>,
    /// Build creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_created: Option<DateTime<Utc>>,
    /// All builds of the series (listings only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builds: Option<Vec<BuildEntry>>,
}

impl Response {
    fn message(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            series: None,
            series_id: None,
            series_created: None,
            commit_hash: None,
            build_number: None,
            build_created: None,
            builds: None,
        }
    }

    fn with_series(mut self, series: &SeriesRecord) -> Self {
        self.series = Some(series.key.to_string());
        self.series_id = Some(series.id.0);
        self.series_created = Some(series.created_on);
        self
    }

    fn with_build(mut self, build: &BuildRecord) -> Self {
        self.commit_hash = Some(build.commit.clone());
        self.build_number = Some(build.build_number.get());
        self.build_created = Some(build.created_on);
        self
    }

    /// Response for an error
    pub fn from_error(error: &Error) -> Self {
        Self::message(error.status(), error.to_string())
    }

    /// Response for the result of `allocate`
    pub fn allocated(allocation: &Allocation) -> Self {
        let (status, message) = match allocation.outcome {
            AllocationOutcome::Created if allocation.series_created => {
                (201, "Unknown series. New build number created.")
            }
            AllocationOutcome::Created => (201, "Known series. New build number created."),
            AllocationOutcome::AlreadyKnown => (200, "Known series. Known commit hash."),
            AllocationOutcome::Conflict => (409, "Commit does already exist in series!"),
        };
        Self::message(status, message)
            .with_series(&allocation.series)
            .with_build(&allocation.build)
    }

    /// Response for the result of `lookup`
    pub fn found(allocation: &Allocation) -> Self {
        Self::message(200, FOUND)
            .with_series(&allocation.series)
            .with_build(&allocation.build)
    }

    /// Response for the result of `list_builds`
    pub fn listing(listing: &SeriesListing) -> Self {
        let mut response = Self::message(200, FOUND).with_series(&listing.series);
        response.builds = Some(listing.builds.iter().map(BuildEntry::from).collect());
        response
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Serialize to indented JSON
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
