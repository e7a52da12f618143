use std::fs;
use std::path::PathBuf;
use crate::core::error::Result;

/// Directory structure for persisted state: the committed index snapshot
/// plus the write-ahead log's open file and, transiently, one committing
/// file during a rotation.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,
    pub wal_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let wal_dir = base_dir.join("wal");
        fs::create_dir_all(&base_dir)?;
        fs::create_dir_all(&wal_dir)?;
        Ok(StorageLayout { base_dir, wal_dir })
    }

    pub fn index_path(&self) -> PathBuf {
        self.base_dir.join("index.bin")
    }

    pub fn log_path(&self) -> PathBuf {
        self.wal_dir.join("write.log")
    }

    pub fn committing_path(&self) -> PathBuf {
        self.wal_dir.join("write.log.committing")
    }
}
