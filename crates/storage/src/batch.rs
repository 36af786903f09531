//! Write batches: everything one committed transaction changes
//!
//! A batch is scoped to a single series, mirroring the transaction that
//! produced it. Records in a batch are fully materialized (ids, timestamps)
//! so the same batch can be written to the WAL and replayed byte-for-byte.

use buildseq_core::{BuildRecord, SeriesKey, SeriesRecord};
use serde::{Deserialize, Serialize};

/// Mutations of one series, applied atomically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    /// Series the batch belongs to
    pub series: SeriesKey,
    /// Series row to create, if the transaction created the series
    pub create_series: Option<SeriesRecord>,
    /// Build rows to insert, in allocation order
    pub builds: Vec<BuildRecord>,
    /// Delete the (empty) series
    pub delete_series: bool,
}

impl WriteBatch {
    /// Empty batch for a series
    pub fn new(series: SeriesKey) -> Self {
        Self {
            series,
            create_series: None,
            builds: Vec::new(),
            delete_series: false,
        }
    }

    /// True if the batch changes nothing
    pub fn is_empty(&self) -> bool {
        self.create_series.is_none() && self.builds.is_empty() && !self.delete_series
    }

    /// Number of row-level operations in the batch
    pub fn len(&self) -> usize {
        usize::from(self.create_series.is_some()) + self.builds.len() + usize::from(self.delete_series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildseq_core::SeriesId;
    use chrono::Utc;

    #[test]
    fn test_empty_batch() {
        let batch = WriteBatch::new(SeriesKey::new(1, 1));
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn test_batch_len_counts_rows() {
        let mut batch = WriteBatch::new(SeriesKey::new(1, 1));
        batch.create_series = Some(SeriesRecord {
            id: SeriesId(1),
            key: SeriesKey::new(1, 1),
            created_on: Utc::now(),
        });
        assert!(!batch.is_empty());
        assert_eq!(batch.len(), 1);
        batch.delete_series = true;
        assert_eq!(batch.len(), 2);
    }
}
