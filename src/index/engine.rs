use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use tracing::debug;
use crate::catalog;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::document::IndexDocument;
use crate::query::builder::CompiledQuery;
use crate::query::matcher::DocumentMatcher;
use crate::search::accumulator::PidList;

/// Immutable view of the index. A search acquires the most recent refreshed
/// view at the moment it starts and holds it for its entire lifetime, so an
/// in-flight search is unaffected by concurrent updates.
pub struct Snapshot {
    pub docs: BTreeMap<String, Arc<IndexDocument>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Stream every matching identifier, in identifier order, into the
    /// accumulator. A match-everything query enumerates the documents
    /// directly instead of evaluating clauses.
    pub fn search(
        &self,
        query: &CompiledQuery,
        matcher: &DocumentMatcher,
        out: &mut PidList,
    ) -> Result<()> {
        match query {
            CompiledQuery::MatchAll => {
                for pid in self.docs.keys() {
                    out.push(pid)?;
                }
            }
            _ => {
                for (pid, doc) in &self.docs {
                    if matcher.matches(doc, query) {
                        out.push(pid)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Highest numeric local id within a namespace, for auto-numbering.
    pub fn max_numeric_local_id(&self, namespace: &str) -> Option<i64> {
        self.docs
            .values()
            .filter(|doc| doc.texts(catalog::PID_NAMESPACE).any(|ns| ns == namespace))
            .filter_map(|doc| doc.longs(catalog::PID_NUM).next())
            .max()
    }
}

/// Single-writer index engine. Mutations land in the live map immediately
/// and become visible to the next refreshed reader; `commit` is the
/// durability event that persists the live state.
pub struct IndexEngine {
    live: Mutex<BTreeMap<String, Arc<IndexDocument>>>,
    refreshed: RwLock<Option<Arc<Snapshot>>>,
    index_path: Option<PathBuf>,
}

impl IndexEngine {
    /// Open the engine, loading the persisted state when it exists.
    pub fn open(index_path: Option<PathBuf>) -> Result<Self> {
        let docs = match &index_path {
            Some(path) if path.exists() => load_index(path)?,
            _ => BTreeMap::new(),
        };
        debug!(documents = docs.len(), "index engine opened");
        Ok(IndexEngine {
            live: Mutex::new(docs),
            refreshed: RwLock::new(None),
            index_path,
        })
    }

    /// Replace any prior document for the same identifier. Delete-then-insert
    /// keyed by the identifier term.
    pub fn upsert(&self, doc: IndexDocument) {
        let mut live = self.live.lock();
        let pid = doc.pid.clone();
        live.remove(&pid);
        live.insert(pid, Arc::new(doc));
        drop(live);
        *self.refreshed.write() = None;
    }

    /// Remove by identifier. Reports whether a document existed to remove.
    pub fn delete(&self, pid: &str) -> bool {
        let existed = self.live.lock().remove(pid).is_some();
        if existed {
            *self.refreshed.write() = None;
        }
        existed
    }

    /// Number of live documents.
    pub fn live_len(&self) -> usize {
        self.live.lock().len()
    }

    /// Persist the live state. In-memory deployments have nothing to do
    /// here. A persistence failure is fatal for the caller since the
    /// on-disk index no longer reflects the accepted mutations.
    pub fn commit(&self) -> Result<()> {
        let Some(path) = &self.index_path else {
            return Ok(());
        };
        let docs = self.live.lock().clone();
        persist_index(path, &docs)
            .map_err(|e| Error::new(ErrorKind::Corrupt, format!("index commit failed: {e}")))
    }

    /// Most recent refreshed view. Rebuilt from the live state after a
    /// mutation, served from cache otherwise.
    pub fn reader(&self) -> Arc<Snapshot> {
        if let Some(snapshot) = self.refreshed.read().as_ref() {
            return snapshot.clone();
        }
        let docs = self.live.lock().clone();
        let snapshot = Arc::new(Snapshot { docs });
        *self.refreshed.write() = Some(snapshot.clone());
        snapshot
    }
}

fn persist_index(path: &PathBuf, docs: &BTreeMap<String, Arc<IndexDocument>>) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)?;
    let mut writer = BufWriter::new(file);

    let count = docs.len() as u64;
    writer.write_all(&count.to_le_bytes())?;
    for doc in docs.values() {
        bincode::serialize_into(&mut writer, doc.as_ref())?;
    }
    writer.flush()?;
    writer.get_ref().sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn load_index(path: &PathBuf) -> Result<BTreeMap<String, Arc<IndexDocument>>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut count_buf = [0u8; 8];
    std::io::Read::read_exact(&mut reader, &mut count_buf)?;
    let count = u64::from_le_bytes(count_buf);

    let mut docs = BTreeMap::new();
    for _ in 0..count {
        let doc: IndexDocument = bincode::deserialize_from(&mut reader)?;
        docs.insert(doc.pid.clone(), Arc::new(doc));
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ObjectProfile;
    use crate::index::document::build_document;

    fn doc(pid: &str, title: &str) -> IndexDocument {
        let profile = ObjectProfile::new(pid).with_dc_field("title", title);
        build_document(&profile).unwrap()
    }

    #[test]
    fn reader_refreshes_after_mutations() {
        let engine = IndexEngine::open(None).unwrap();
        assert!(engine.reader().is_empty());

        engine.upsert(doc("demo:1", "one"));
        assert_eq!(engine.reader().len(), 1);

        // An in-flight snapshot is unaffected by later mutations.
        let snapshot = engine.reader();
        engine.upsert(doc("demo:2", "two"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(engine.reader().len(), 2);
    }

    #[test]
    fn delete_reports_existence() {
        let engine = IndexEngine::open(None).unwrap();
        engine.upsert(doc("demo:1", "one"));
        assert!(engine.delete("demo:1"));
        assert!(!engine.delete("demo:1"));
        assert!(engine.reader().is_empty());
    }

    #[test]
    fn committed_state_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.bin");

        let engine = IndexEngine::open(Some(path.clone())).unwrap();
        engine.upsert(doc("demo:1", "persisted"));
        engine.upsert(doc("demo:2", "dropped again"));
        engine.delete("demo:2");
        engine.commit().unwrap();
        drop(engine);

        let reopened = IndexEngine::open(Some(path)).unwrap();
        let snapshot = reopened.reader();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.docs.contains_key("demo:1"));
    }

    #[test]
    fn uncommitted_state_does_not_survive_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("index.bin");

        let engine = IndexEngine::open(Some(path.clone())).unwrap();
        engine.upsert(doc("demo:1", "never committed"));
        drop(engine);

        let reopened = IndexEngine::open(Some(path)).unwrap();
        assert!(reopened.reader().is_empty());
    }

    #[test]
    fn max_numeric_local_id_scopes_by_namespace() {
        let engine = IndexEngine::open(None).unwrap();
        engine.upsert(doc("demo:3", "a"));
        engine.upsert(doc("demo:11", "b"));
        engine.upsert(doc("work:40", "c"));
        engine.upsert(doc("demo:raw", "d"));

        let snapshot = engine.reader();
        assert_eq!(snapshot.max_numeric_local_id("demo"), Some(11));
        assert_eq!(snapshot.max_numeric_local_id("work"), Some(40));
        assert_eq!(snapshot.max_numeric_local_id("none"), None);
    }
}
