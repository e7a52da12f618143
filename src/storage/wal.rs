use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::document::IndexDocument;
use crate::storage::layout::StorageLayout;

/// Upper bound for one serialized record. Anything larger is treated as
/// corruption.
const MAX_RECORD_LEN: u32 = 64 * 1024 * 1024;

/// One pending index mutation. An absent document is a deletion marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub pid: String,
    pub doc: Option<IndexDocument>,
}

impl LogRecord {
    pub fn upsert(doc: IndexDocument) -> Self {
        LogRecord {
            pid: doc.pid.clone(),
            doc: Some(doc),
        }
    }

    pub fn delete(pid: &str) -> Self {
        LogRecord {
            pid: pid.to_string(),
            doc: None,
        }
    }
}

/// Append-only log of mutations not yet committed by the index engine.
/// Records are framed `len | crc32 | payload`; a truncated or corrupt
/// trailing record is treated as end-of-stream on replay, never an error.
pub struct WriteLog {
    log_path: PathBuf,
    committing_path: PathBuf,
    keep_open: bool,
    file: Option<File>,
}

impl WriteLog {
    pub fn open(layout: &StorageLayout, keep_open: bool) -> Result<Self> {
        let mut log = WriteLog {
            log_path: layout.log_path(),
            committing_path: layout.committing_path(),
            keep_open,
            file: None,
        };
        if keep_open {
            log.file = Some(log.open_log_file()?);
        }
        Ok(log)
    }

    fn open_log_file(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        Ok(file)
    }

    /// Append one mutation and sync it to disk.
    pub fn append(&mut self, record: &LogRecord) -> Result<()> {
        let payload = bincode::serialize(record)?;
        let len = payload.len() as u32;
        let crc = crc32fast::hash(&payload);

        let mut file = match self.file.take() {
            Some(file) => file,
            None => self.open_log_file()?,
        };
        file.write_all(&len.to_le_bytes())?;
        file.write_all(&crc.to_le_bytes())?;
        file.write_all(&payload)?;
        file.sync_all()?;

        if self.keep_open {
            self.file = Some(file);
        }
        Ok(())
    }

    /// Rotate the open log out of the way so the engine can commit. The
    /// renamed file stays on disk until `finish_commit`, covering a crash
    /// between the rename and the engine's own durable commit.
    pub fn rotate_to_committing(&mut self) -> Result<()> {
        self.file = None; // close before the rename
        fs::rename(&self.log_path, &self.committing_path)?;
        if self.keep_open {
            self.file = Some(self.open_log_file()?);
        }
        debug!("write log rotated for commit");
        Ok(())
    }

    /// The engine commit succeeded, the committing file is now redundant.
    pub fn finish_commit(&self) -> Result<()> {
        fs::remove_file(&self.committing_path)?;
        Ok(())
    }

    /// Replay records left behind by a prior run: first the committing file,
    /// then the open log, each in append order. Returns how many records
    /// were applied.
    pub fn replay<F: FnMut(LogRecord)>(layout: &StorageLayout, mut apply: F) -> Result<usize> {
        let mut replayed = 0;
        for path in [layout.committing_path(), layout.log_path()] {
            if !path.exists() {
                continue;
            }
            for record in read_records(&path)? {
                apply(record);
                replayed += 1;
            }
        }
        if replayed > 0 {
            debug!(records = replayed, "write log replayed");
        }
        Ok(replayed)
    }

    /// Drop replayed files once their records are durable in the index.
    pub fn clear(layout: &StorageLayout) -> Result<()> {
        for path in [layout.committing_path(), layout.log_path()] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

fn read_records(path: &PathBuf) -> Result<Vec<LogRecord>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();

    loop {
        let mut header = [0u8; 8];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if len > MAX_RECORD_LEN {
            return Err(Error::new(
                ErrorKind::Corrupt,
                format!("write log record of {len} bytes in {path:?}"),
            ));
        }

        let mut payload = vec![0u8; len as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Crash mid-append. Everything before this record is good.
                warn!(?path, "truncated trailing record in write log");
                break;
            }
            Err(e) => return Err(e.into()),
        }
        if crc32fast::hash(&payload) != crc {
            warn!(?path, "checksum mismatch in write log, stopping replay");
            break;
        }
        match bincode::deserialize::<LogRecord>(&payload) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(?path, %err, "undecodable write log record, stopping replay");
                break;
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ObjectProfile;
    use crate::index::document::build_document;
    use tempfile::TempDir;

    fn layout(dir: &TempDir) -> StorageLayout {
        StorageLayout::new(dir.path().to_path_buf()).unwrap()
    }

    fn record(pid: &str, title: &str) -> LogRecord {
        let profile = ObjectProfile::new(pid).with_dc_field("title", title);
        LogRecord::upsert(build_document(&profile).unwrap())
    }

    #[test]
    fn appended_records_replay_in_order() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);

        let mut log = WriteLog::open(&layout, true).unwrap();
        log.append(&record("demo:1", "first")).unwrap();
        log.append(&record("demo:1", "second")).unwrap();
        log.append(&LogRecord::delete("demo:2")).unwrap();
        drop(log);

        let mut seen = Vec::new();
        let replayed = WriteLog::replay(&layout, |r| seen.push(r)).unwrap();
        assert_eq!(replayed, 3);
        assert_eq!(seen[0].doc.as_ref().unwrap().texts("title").next(), Some("first"));
        assert_eq!(seen[1].doc.as_ref().unwrap().texts("title").next(), Some("second"));
        assert_eq!(seen[2], LogRecord::delete("demo:2"));
    }

    #[test]
    fn committing_file_replays_before_open_log() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);

        let mut log = WriteLog::open(&layout, true).unwrap();
        log.append(&record("demo:1", "older")).unwrap();
        log.rotate_to_committing().unwrap();
        // Crash before finish_commit: both files exist.
        log.append(&record("demo:1", "newer")).unwrap();
        drop(log);

        let mut titles = Vec::new();
        WriteLog::replay(&layout, |r| {
            titles.push(r.doc.unwrap().texts("title").next().unwrap().to_string());
        })
        .unwrap();
        assert_eq!(titles, vec!["older", "newer"]);
    }

    #[test]
    fn truncated_tail_is_end_of_stream() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);

        let mut log = WriteLog::open(&layout, false).unwrap();
        log.append(&record("demo:1", "kept")).unwrap();
        log.append(&record("demo:2", "lost")).unwrap();

        // Chop bytes off the final record.
        let data = fs::read(layout.log_path()).unwrap();
        fs::write(layout.log_path(), &data[..data.len() - 5]).unwrap();

        let mut pids = Vec::new();
        let replayed = WriteLog::replay(&layout, |r| pids.push(r.pid)).unwrap();
        assert_eq!(replayed, 1);
        assert_eq!(pids, vec!["demo:1"]);
    }

    #[test]
    fn finish_commit_removes_the_committing_file() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);

        let mut log = WriteLog::open(&layout, true).unwrap();
        log.append(&record("demo:1", "x")).unwrap();
        log.rotate_to_committing().unwrap();
        assert!(layout.committing_path().exists());

        log.finish_commit().unwrap();
        assert!(!layout.committing_path().exists());

        // The fresh log is empty, nothing replays after clear.
        WriteLog::clear(&layout).unwrap();
        let replayed = WriteLog::replay(&layout, |_| {}).unwrap();
        assert_eq!(replayed, 0);
    }
}
