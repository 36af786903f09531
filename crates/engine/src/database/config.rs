//! Database configuration via `buildseq.toml`
//!
//! On first open, a default `buildseq.toml` is created in the data directory.
//! To change settings, edit the file and restart.

use super::transactions::RetryConfig;
use buildseq_core::{Error, Result, DEFAULT_MIN_COMMIT_LENGTH, MAX_COMMIT_LENGTH};
use buildseq_durability::DurabilityMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the database data directory.
pub const CONFIG_FILE_NAME: &str = "buildseq.toml";

/// Length of a hex-encoded SHA-512 digest
const DIGEST_HEX_LEN: usize = 128;

/// Database configuration loaded from `buildseq.toml`.
///
/// # Example
///
/// ```toml
/// durability = "standard"
/// min_commit_length = 40
/// authorized_digests = []
///
/// [retry]
/// max_retries = 3
/// base_delay_ms = 10
/// max_delay_ms = 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSeqConfig {
    /// Durability mode: `"standard"` or `"always"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Shortest commit identifier accepted by the API.
    #[serde(default = "default_min_commit_length")]
    pub min_commit_length: usize,
    /// SHA-512 hex digests of the tokens allowed to call the API.
    #[serde(default)]
    pub authorized_digests: Vec<String>,
    /// Optimistic-conflict retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_durability_str() -> String {
    DurabilityMode::default().as_str().to_string()
}

fn default_min_commit_length() -> usize {
    DEFAULT_MIN_COMMIT_LENGTH
}

impl Default for BuildSeqConfig {
    fn default() -> Self {
        Self {
            durability: default_durability_str(),
            min_commit_length: default_min_commit_length(),
            authorized_digests: Vec::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl BuildSeqConfig {
    /// Parse the durability string into a `DurabilityMode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"standard"` or `"always"`.
    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        self.durability.parse()
    }

    /// Check every field, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.durability_mode()?;

        if self.min_commit_length == 0 || self.min_commit_length > MAX_COMMIT_LENGTH {
            return Err(Error::invalid_input(format!(
                "min_commit_length must be between 1 and {}, got {}",
                MAX_COMMIT_LENGTH, self.min_commit_length
            )));
        }

        for digest in &self.authorized_digests {
            if digest.len() != DIGEST_HEX_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(Error::invalid_input(format!(
                    "authorized_digests entry '{}' is not a {}-character hex SHA-512 digest",
                    digest, DIGEST_HEX_LEN
                )));
            }
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::invalid_input(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# buildseq configuration
#
# Durability mode: "standard" (default) or "always"
#   "standard" = fsync every 100ms or 64 commits, may lose the last interval on crash
#   "always"   = fsync every commit, zero data loss
durability = "standard"

# Shortest commit identifier the API accepts (1..=128).
# 40 fits full SHA-1 hashes; lower it to accept abbreviated hashes.
min_commit_length = 40

# SHA-512 hex digests of the tokens allowed to call the API.
# Generate one with: buildseq hash-token <token>
authorized_digests = []

# Retry policy when two allocations race in the same series.
[retry]
max_retries = 3
base_delay_ms = 10
max_delay_ms = 100
"#
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::storage(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: BuildSeqConfig = toml::from_str(&content).map_err(|e| {
            Error::invalid_input(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::storage(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::storage(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn digest() -> String {
        "ab".repeat(64)
    }

    #[test]
    fn default_config_is_valid() {
        let config = BuildSeqConfig::default();
        assert_eq!(config.durability, "standard");
        assert_eq!(config.min_commit_length, 40);
        assert_eq!(config.durability_mode().unwrap(), DurabilityMode::Standard);
        config.validate().unwrap();
    }

    #[test]
    fn default_toml_matches_default_config() {
        let config: BuildSeqConfig = toml::from_str(BuildSeqConfig::default_toml()).unwrap();
        assert_eq!(config, BuildSeqConfig::default());
    }

    #[test]
    fn parse_always() {
        let config: BuildSeqConfig = toml::from_str("durability = \"always\"").unwrap();
        assert_eq!(config.durability_mode().unwrap(), DurabilityMode::Always);
    }

    #[test]
    fn invalid_durability_rejected() {
        let config: BuildSeqConfig = toml::from_str("durability = \"turbo\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn min_commit_length_bounds() {
        for (len, ok) in [(0, false), (1, true), (16, true), (128, true), (129, false)] {
            let config = BuildSeqConfig {
                min_commit_length: len,
                ..Default::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "length {}", len);
        }
    }

    #[test]
    fn malformed_digest_rejected() {
        let mut config = BuildSeqConfig {
            authorized_digests: vec![digest()],
            ..Default::default()
        };
        config.validate().unwrap();

        config.authorized_digests = vec!["abc".into()];
        assert!(config.validate().is_err());
        config.authorized_digests = vec!["zz".repeat(64)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_retry_delays_rejected() {
        let config = BuildSeqConfig {
            retry: RetryConfig::default().with_base_delay_ms(500),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "min_commit_length = 16\n[retry]\nmax_retries = 9\n").unwrap();

        let config = BuildSeqConfig::from_file(&path).unwrap();
        assert_eq!(config.durability, "standard");
        assert_eq!(config.min_commit_length, 16);
        assert_eq!(config.retry.max_retries, 9);
        assert_eq!(config.retry.base_delay_ms, 10);
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "durability = \"always\"\n").unwrap();

        BuildSeqConfig::write_default_if_missing(&path).unwrap();
        let config = BuildSeqConfig::from_file(&path).unwrap();
        assert_eq!(config.durability, "always");
    }

    #[test]
    fn write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = BuildSeqConfig {
            durability: "always".into(),
            min_commit_length: 16,
            authorized_digests: vec![digest()],
            retry: RetryConfig::no_retry(),
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(BuildSeqConfig::from_file(&path).unwrap(), config);
    }
}
