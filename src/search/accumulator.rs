use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;
use crate::core::error::{Error, ErrorKind, Result};

/// Ordered accumulator of matching identifiers. Held in memory up to the
/// configured threshold, then transparently spilled to a comma-separated
/// temporary file. Once spilled it never reverts to memory, even when
/// drained.
pub struct PidList {
    mem: Vec<String>,
    spill: Option<SpillFile>,
    threshold: usize,
    spill_dir: PathBuf,
    total: usize,
    consumed: usize,
}

struct SpillFile {
    path: PathBuf,
    file: File,
    read_offset: u64,
    deleted: bool,
}

impl PidList {
    pub fn new(threshold: usize, spill_dir: PathBuf) -> Self {
        PidList {
            mem: Vec::new(),
            spill: None,
            threshold,
            spill_dir,
            total: 0,
            consumed: 0,
        }
    }

    /// Total number of accumulated identifiers, consumed or not.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Identifiers not yet handed out by `next`/`next_batch`.
    pub fn remaining(&self) -> usize {
        self.total - self.consumed
    }

    pub fn has_spilled(&self) -> bool {
        self.spill.is_some()
    }

    /// Append one identifier, migrating to the spill file at the threshold.
    pub fn push(&mut self, pid: &str) -> Result<()> {
        match &mut self.spill {
            Some(spill) => {
                spill.file.write_all(b",")?;
                spill.file.write_all(pid.as_bytes())?;
            }
            None => {
                self.mem.push(pid.to_string());
                if self.mem.len() >= self.threshold {
                    self.spill_out()?;
                }
            }
        }
        self.total += 1;
        Ok(())
    }

    /// Flush the in-memory contents to a fresh uniquely-named file and
    /// discard the vector. Appends go straight to the file from here on.
    fn spill_out(&mut self) -> Result<()> {
        let path = self
            .spill_dir
            .join(format!("fieldsearch-{}.list", Uuid::new_v4()));
        let mut file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .append(true)
            .open(&path)?;
        file.write_all(self.mem.join(",").as_bytes())?;
        debug!(?path, pids = self.mem.len(), "result accumulator spilled to disk");

        self.mem = Vec::new();
        self.spill = Some(SpillFile {
            path,
            file,
            read_offset: 0,
            deleted: false,
        });
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<String>> {
        Ok(self.next_batch(1)?.pop())
    }

    /// Hand out the next up-to-`n` identifiers in append order. Reading the
    /// spill file to exhaustion deletes it.
    pub fn next_batch(&mut self, n: usize) -> Result<Vec<String>> {
        if n == 0 || self.remaining() == 0 {
            return Ok(Vec::new());
        }
        match &mut self.spill {
            None => {
                let end = (self.consumed + n).min(self.mem.len());
                let out = self.mem[self.consumed..end].to_vec();
                self.consumed = end;
                Ok(out)
            }
            Some(spill) => {
                let mut handle = &spill.file;
                handle.seek(SeekFrom::Start(spill.read_offset))?;
                let mut reader = BufReader::new(handle);
                let mut out = Vec::with_capacity(n.min(self.total - self.consumed));
                let mut buf = Vec::new();

                while out.len() < n && self.consumed < self.total {
                    buf.clear();
                    let read = reader.read_until(b',', &mut buf)?;
                    if read == 0 {
                        break;
                    }
                    spill.read_offset += read as u64;
                    if buf.last() == Some(&b',') {
                        buf.pop();
                    }
                    let pid = String::from_utf8(buf.clone()).map_err(|e| {
                        Error::new(ErrorKind::Corrupt, format!("spill file damaged: {e}"))
                    })?;
                    out.push(pid);
                    self.consumed += 1;
                }
                drop(reader);

                if self.consumed >= self.total && !spill.deleted {
                    fs::remove_file(&spill.path)?;
                    spill.deleted = true;
                }
                Ok(out)
            }
        }
    }

    /// Release the structure unconditionally, deleting a live backing file
    /// regardless of exhaustion.
    pub fn dispose(&mut self) -> Result<()> {
        self.mem = Vec::new();
        if let Some(spill) = &mut self.spill {
            if !spill.deleted {
                fs::remove_file(&spill.path)?;
                spill.deleted = true;
            }
        }
        Ok(())
    }
}

impl Drop for PidList {
    fn drop(&mut self) {
        // Best effort. Explicit dispose is the path that reports errors.
        let _ = self.dispose();
    }
}
