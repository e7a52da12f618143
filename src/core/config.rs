use std::path::PathBuf;
use std::time::Duration;
use crate::core::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub index_dir: Option<PathBuf>,    // None = in-memory index, no persistence
    pub write_lock_timeout: Duration,

    // Result cache / pagination
    pub result_lifetime_secs: u64,     // sweeper period equals this lifetime

    // Write-ahead log
    pub wal_enabled: bool,
    pub wal_commit_size: usize,        // mutations per batched engine commit
    pub wal_keep_open: bool,           // hold the log handle between appends

    // Spillable accumulator
    pub spill_threshold: usize,        // pids held in memory before spilling
    pub spill_dir: Option<PathBuf>,    // None = fresh TempDir under the system tmp

    // Open ends for date range queries. Historical operational choice,
    // not a protocol requirement, hence configurable.
    pub range_floor_ms: i64,           // beginning of 2000, UTC epoch millis
    pub range_ceiling_ms: i64,         // beginning of 2050, UTC epoch millis
}

impl Default for Config {
    fn default() -> Self {
        Config {
            index_dir: None,
            write_lock_timeout: Duration::from_secs(10),
            result_lifetime_secs: 60,
            wal_enabled: false,
            wal_commit_size: 20,
            wal_keep_open: true,
            spill_threshold: 1000,
            spill_dir: None,
            range_floor_ms: 946_684_800_000,
            range_ceiling_ms: 2_524_608_000_000,
        }
    }
}

impl Config {
    /// Open an on-disk index rooted at `dir` with the WAL enabled.
    pub fn on_disk(dir: PathBuf) -> Self {
        Config {
            index_dir: Some(dir),
            wal_enabled: true,
            ..Config::default()
        }
    }

    /// Reject settings the engine cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.result_lifetime_secs == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "result lifetime must be at least one second".to_string(),
            ));
        }
        if self.spill_threshold == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "spill threshold must be non-zero".to_string(),
            ));
        }
        if self.wal_enabled {
            if self.index_dir.is_none() {
                return Err(Error::new(
                    ErrorKind::Config,
                    "write-ahead log requires an index directory".to_string(),
                ));
            }
            if self.wal_commit_size == 0 {
                return Err(Error::new(
                    ErrorKind::Config,
                    "WAL commit size must be non-zero".to_string(),
                ));
            }
        }
        if self.write_lock_timeout.is_zero() {
            return Err(Error::new(
                ErrorKind::Config,
                "write lock timeout must be non-zero".to_string(),
            ));
        }
        if self.range_floor_ms >= self.range_ceiling_ms {
            return Err(Error::new(
                ErrorKind::Config,
                "date range floor must precede the ceiling".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn wal_without_index_dir_is_rejected() {
        let config = Config {
            wal_enabled: true,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
    }

    #[test]
    fn zero_lifetime_is_rejected() {
        let config = Config {
            result_lifetime_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
