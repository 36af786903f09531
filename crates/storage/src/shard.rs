//! Per-series shard: the series row, its builds and their unique indices

use buildseq_core::{BuildNumber, BuildRecord, Error, Result, SeriesRecord};
use rustc_hash::FxHashMap;

/// All rows belonging to one series
///
/// Builds are kept in a vector in insertion order. Because the allocator
/// always appends `max + 1`, insertion order equals build-number order for
/// allocator-produced data; `sorted_builds` sorts anyway so that seeded or
/// replayed data lists correctly.
#[derive(Debug, Clone)]
pub struct SeriesShard {
    record: SeriesRecord,
    builds: Vec<BuildRecord>,
    by_commit: FxHashMap<String, usize>,
    by_number: FxHashMap<BuildNumber, usize>,
    max_number: Option<BuildNumber>,
    version: u64,
}

impl SeriesShard {
    /// Create a shard for a freshly created series
    pub fn new(record: SeriesRecord, version: u64) -> Self {
        Self {
            record,
            builds: Vec::new(),
            by_commit: FxHashMap::default(),
            by_number: FxHashMap::default(),
            max_number: None,
            version,
        }
    }

    /// The series row
    pub fn record(&self) -> &SeriesRecord {
        &self.record
    }

    /// Version of the last batch applied to this series
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of builds in the series
    pub fn len(&self) -> usize {
        self.builds.len()
    }

    /// True if the series has no builds
    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    /// Highest build number in the series
    pub fn max_build_number(&self) -> Option<BuildNumber> {
        self.max_number
    }

    /// Look up the build for a commit
    pub fn build_for_commit(&self, commit: &str) -> Option<&BuildRecord> {
        self.by_commit.get(commit).map(|&idx| &self.builds[idx])
    }

    /// Look up the build holding a number
    pub fn build_for_number(&self, number: BuildNumber) -> Option<&BuildRecord> {
        self.by_number.get(&number).map(|&idx| &self.builds[idx])
    }

    /// All builds ordered by build number ascending
    pub fn sorted_builds(&self) -> Vec<BuildRecord> {
        let mut builds = self.builds.clone();
        builds.sort_by_key(|b| b.build_number);
        builds
    }

    /// Check that `builds` can be inserted without violating a constraint
    ///
    /// Also checks the builds against each other, so a batch carrying the
    /// same commit twice is rejected as a whole.
    pub fn check_builds(&self, builds: &[BuildRecord]) -> Result<()> {
        for (i, build) in builds.iter().enumerate() {
            if build.series_id != self.record.id {
                return Err(Error::DanglingBuild(build.series_id));
            }
            let earlier = &builds[..i];
            if self.by_commit.contains_key(&build.commit)
                || earlier.iter().any(|b| b.commit == build.commit)
            {
                return Err(Error::DuplicateCommit {
                    series: self.record.key,
                    commit: build.commit.clone(),
                });
            }
            if self.by_number.contains_key(&build.build_number)
                || earlier.iter().any(|b| b.build_number == build.build_number)
            {
                return Err(Error::DuplicateBuildNumber {
                    series: self.record.key,
                    build_number: build.build_number,
                });
            }
        }
        Ok(())
    }

    /// Insert builds and stamp the shard with `version`
    ///
    /// Callers must run [`SeriesShard::check_builds`] first; this method
    /// re-checks and leaves the shard untouched on failure.
    pub fn insert_builds(&mut self, builds: &[BuildRecord], version: u64) -> Result<()> {
        self.check_builds(builds)?;
        for build in builds {
            let idx = self.builds.len();
            self.by_commit.insert(build.commit.clone(), idx);
            self.by_number.insert(build.build_number, idx);
            self.max_number = self.max_number.max(Some(build.build_number));
            self.builds.push(build.clone());
        }
        self.version = self.version.max(version);
        Ok(())
    }
}
