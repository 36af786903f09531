//! Input validation for series and commit segments.
//!
//! Pure functions; nothing here touches the store.

use buildseq_core::{SeriesKey, DEFAULT_MIN_COMMIT_LENGTH, MAX_COMMIT_LENGTH};

use crate::{Error, Result};

/// Accepted commit identifier lengths, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitPolicy {
    /// Shortest accepted commit
    pub min_length: usize,
    /// Longest accepted commit
    pub max_length: usize,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self::with_min_length(DEFAULT_MIN_COMMIT_LENGTH)
    }
}

impl CommitPolicy {
    /// Policy with the given minimum and the column-width maximum
    pub fn with_min_length(min_length: usize) -> Self {
        Self {
            min_length,
            max_length: MAX_COMMIT_LENGTH,
        }
    }
}

/// Parse `"<major>.<minor>"`.
///
/// Both parts must be non-empty ASCII digit strings that fit in `u32`.
/// Leading zeros are accepted (`"01.2"` is `1.2`).
///
/// # Errors
///
/// `InvalidSeries` for anything else, signs and whitespace included.
pub fn parse_series(text: &str) -> Result<SeriesKey> {
    let invalid = || Error::InvalidSeries {
        series: text.to_string(),
    };
    let (major, minor) = text.split_once('.').ok_or_else(invalid)?;
    Ok(SeriesKey::new(
        parse_component(major).ok_or_else(invalid)?,
        parse_component(minor).ok_or_else(invalid)?,
    ))
}

fn parse_component(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Check a commit identifier's length against `policy`.
///
/// Length is counted in characters; the content is opaque.
pub fn validate_commit(commit: &str, policy: &CommitPolicy) -> Result<()> {
    let len = commit.chars().count();
    if len < policy.min_length {
        return Err(Error::CommitTooShort {
            min: policy.min_length,
        });
    }
    if len > policy.max_length {
        return Err(Error::CommitTooLong {
            max: policy.max_length,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_series() {
        assert_eq!(parse_series("1.1").unwrap(), SeriesKey::new(1, 1));
        assert_eq!(parse_series("0.0").unwrap(), SeriesKey::new(0, 0));
        assert_eq!(parse_series("01.2").unwrap(), SeriesKey::new(1, 2));
        assert_eq!(
            parse_series("4294967295.7").unwrap(),
            SeriesKey::new(u32::MAX, 7)
        );
    }

    #[test]
    fn test_invalid_series() {
        for text in [
            "", "11", "1.a", "a.1", ".1", "1.", "1.2.3", "+1.2", "-1.2", " 1.2", "1.2 ",
            "1,2", "4294967296.0", "١.٢",
        ] {
            assert!(
                matches!(parse_series(text), Err(Error::InvalidSeries { .. })),
                "{:?} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_commit_bounds() {
        let policy = CommitPolicy::default();
        assert_eq!(
            validate_commit(&"a".repeat(39), &policy),
            Err(Error::CommitTooShort { min: 40 })
        );
        assert!(validate_commit(&"a".repeat(40), &policy).is_ok());
        assert!(validate_commit(&"a".repeat(128), &policy).is_ok());
        assert_eq!(
            validate_commit(&"a".repeat(129), &policy),
            Err(Error::CommitTooLong { max: 128 })
        );
    }

    #[test]
    fn test_short_policy() {
        let policy = CommitPolicy::with_min_length(16);
        assert!(validate_commit("0123456789abcdef", &policy).is_ok());
        assert!(validate_commit("0123456789abcde", &policy).is_err());
    }

    #[test]
    fn test_length_counts_characters() {
        let policy = CommitPolicy::with_min_length(4);
        assert!(validate_commit("ääää", &policy).is_ok());
        assert!(validate_commit("äää", &policy).is_err());
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(major: u32, minor: u32) {
            let key = SeriesKey::new(major, minor);
            prop_assert_eq!(parse_series(&key.to_string()).unwrap(), key);
        }

        #[test]
        fn prop_non_digit_component_rejected(major in "[0-9]{0,3}[^0-9.][0-9]{0,3}", minor in "[0-9]{1,3}") {
            let text = format!("{}.{}", major, minor);
            prop_assert!(parse_series(&text).is_err());
        }
    }
}
