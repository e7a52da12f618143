use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;
use chrono::Utc;
use parking_lot::Mutex;
use tempfile::TempDir;
use tracing::{debug, error};
use crate::catalog;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{EngineStats, StatsSnapshot};
use crate::core::types::ObjectProfile;
use crate::index::document::build_document;
use crate::index::engine::IndexEngine;
use crate::query::builder::QueryBuilder;
use crate::query::matcher::DocumentMatcher;
use crate::query::types::FieldSearchQuery;
use crate::search::accumulator::PidList;
use crate::search::cache::{ResultCache, Session, new_token};
use crate::search::results::{SearchResult, project};
use crate::storage::layout::StorageLayout;
use crate::storage::wal::{LogRecord, WriteLog};

/// Resolver against the primary object store, used while materializing
/// result pages.
pub trait ObjectStore: Send + Sync {
    fn read_object(&self, pid: &str) -> Result<ObjectProfile>;
}

/// Mutation-side state. Everything behind one mutex so WAL append order is
/// commit order.
struct WriteState {
    wal: Option<WriteLog>,
    pending: usize,
}

/// The single entry point external collaborators call. Owns the write log,
/// the query builder, the index engine and the result cache, and enforces
/// at most one document per identifier.
pub struct FieldSearchEngine {
    config: Config,
    store: Arc<dyn ObjectStore>,
    index: IndexEngine,
    matcher: DocumentMatcher,
    builder: QueryBuilder,
    writer: Mutex<WriteState>,
    cache: ResultCache,
    stats: Arc<EngineStats>,
    spill_dir: PathBuf,
    _spill_tmp: Option<TempDir>,
}

impl FieldSearchEngine {
    /// Open the engine. Recovery runs here: write-log records left behind by
    /// a prior run are replayed into the index, in append order, and
    /// committed once before normal operation resumes.
    pub fn open(config: Config, store: Arc<dyn ObjectStore>) -> Result<Self> {
        config.validate()?;

        let layout = match &config.index_dir {
            Some(dir) => Some(StorageLayout::new(dir.clone())?),
            None => None,
        };
        let index = IndexEngine::open(layout.as_ref().map(|l| l.index_path()))?;

        let mut wal = None;
        if config.wal_enabled {
            let layout = layout.as_ref().ok_or_else(|| {
                Error::new(ErrorKind::Config, "WAL enabled without storage".to_string())
            })?;
            let replayed = WriteLog::replay(layout, |record| match record.doc {
                Some(doc) => index.upsert(doc),
                None => {
                    index.delete(&record.pid);
                }
            })?;
            if replayed > 0 {
                index.commit()?;
                debug!(records = replayed, "recovered index from write log");
            }
            WriteLog::clear(layout)?;
            wal = Some(WriteLog::open(layout, config.wal_keep_open)?);
        }

        let (spill_dir, spill_tmp) = match &config.spill_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                (dir.clone(), None)
            }
            None => {
                let tmp = TempDir::new()?;
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };

        let stats = Arc::new(EngineStats::new());
        let cache = ResultCache::start(config.result_lifetime_secs, stats.clone());
        let builder = QueryBuilder::new(&config);

        Ok(FieldSearchEngine {
            store,
            index,
            matcher: DocumentMatcher::new(),
            builder,
            writer: Mutex::new(WriteState { wal, pending: 0 }),
            cache,
            stats,
            spill_dir,
            _spill_tmp: spill_tmp,
            config,
        })
    }

    fn lock_writer(&self) -> Result<parking_lot::MutexGuard<'_, WriteState>> {
        self.writer
            .try_lock_for(self.config.write_lock_timeout)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidState,
                    "timed out waiting for the write lock".to_string(),
                )
            })
    }

    /// Commit at the batch boundary, or after every mutation when the WAL
    /// is disabled and durability is the engine's own problem.
    fn finish_mutation(&self, writer: &mut WriteState) -> Result<()> {
        match &mut writer.wal {
            Some(wal) => {
                writer.pending += 1;
                if writer.pending >= self.config.wal_commit_size {
                    wal.rotate_to_committing()?;
                    self.index.commit()?;
                    wal.finish_commit()?;
                    writer.pending = 0;
                    self.stats.wal_commits.fetch_add(1, Ordering::Relaxed);
                }
                Ok(())
            }
            None => self.index.commit(),
        }
    }

    /// Index the current projection of one repository object, replacing any
    /// prior document for the same identifier.
    pub fn update(&self, profile: &ObjectProfile) -> Result<()> {
        let started = Instant::now();
        let doc = build_document(profile);
        self.stats
            .last_build_micros
            .store(started.elapsed().as_micros() as u64, Ordering::Relaxed);

        let mut writer = self.lock_writer()?;
        match doc {
            Some(doc) => {
                self.index.upsert(doc.clone());
                if let Some(wal) = &mut writer.wal {
                    wal.append(&LogRecord::upsert(doc))?;
                }
            }
            None => {
                // Nothing indexable. Any prior document is superseded, so
                // clear it rather than leaving stale fields behind.
                self.index.delete(&profile.pid);
                if let Some(wal) = &mut writer.wal {
                    wal.append(&LogRecord::delete(&profile.pid))?;
                }
            }
        }
        self.stats.updates.fetch_add(1, Ordering::Relaxed);
        self.finish_mutation(&mut writer)
    }

    /// Remove an object from the index. Reports whether a document existed;
    /// re-deleting is a no-op, not an error.
    pub fn delete(&self, pid: &str) -> Result<bool> {
        let mut writer = self.lock_writer()?;
        let existed = self.index.delete(pid);
        if let Some(wal) = &mut writer.wal {
            wal.append(&LogRecord::delete(pid))?;
        }
        self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        self.finish_mutation(&mut writer)?;
        Ok(existed)
    }

    /// Run a query and return the first page of results. The search takes
    /// the most recent refreshed view of the index and holds it for its
    /// entire lifetime, including all resumed pages.
    pub fn find_objects(
        &self,
        result_fields: &[String],
        max_results: usize,
        query: &FieldSearchQuery,
    ) -> Result<SearchResult> {
        let fields = catalog::filter_result_fields(result_fields);
        if fields.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "no requested result field is in the catalog".to_string(),
            ));
        }
        if max_results == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                "max results must be at least one".to_string(),
            ));
        }

        let compiled = self.builder.compile(query);
        let snapshot = self.index.reader();
        let mut pids = PidList::new(self.config.spill_threshold, self.spill_dir.clone());
        snapshot.search(&compiled, &self.matcher, &mut pids)?;
        self.stats.searches.fetch_add(1, Ordering::Relaxed);

        self.step(Session {
            pids,
            fields,
            max_results,
            cursor: 0,
            expires: Utc::now(),
        })
    }

    /// Fetch the next page of a cached search. An unknown or expired token
    /// is its own error so clients know to start a fresh search.
    pub fn resume_find_objects(&self, token: &str) -> Result<SearchResult> {
        let mut session = self.cache.take(token).ok_or_else(|| {
            Error::new(
                ErrorKind::SessionExpired,
                format!("unknown or expired resumption token {token}"),
            )
        })?;
        if session.expires <= Utc::now() {
            let _ = session.pids.dispose();
            return Err(Error::new(
                ErrorKind::SessionExpired,
                format!("resumption token {token} has expired"),
            ));
        }
        self.stats.resumes.fetch_add(1, Ordering::Relaxed);
        self.step(session)
    }

    /// Materialize one page and either re-register the session under a new
    /// token or terminate the chain.
    fn step(&self, mut session: Session) -> Result<SearchResult> {
        let start = session.cursor;
        let complete_list_size = session.pids.len();

        let batch = session.pids.next_batch(session.max_results)?;
        let mut results = Vec::with_capacity(batch.len());
        for pid in &batch {
            match self.store.read_object(pid) {
                Ok(profile) => results.push(project(&profile, &session.fields)),
                // The page is still good without this one object.
                Err(err) => error!(%pid, %err, "could not materialize object for result page"),
            }
        }

        if session.pids.remaining() > 0 {
            let token = new_token();
            let expires =
                Utc::now() + chrono::Duration::seconds(self.config.result_lifetime_secs as i64);
            session.cursor = start + batch.len();
            session.expires = expires;
            self.cache.insert(token.clone(), session);
            Ok(SearchResult {
                results,
                token: Some(token),
                cursor: start,
                complete_list_size,
                expiration: Some(expires),
            })
        } else {
            session.pids.dispose()?;
            Ok(SearchResult {
                results,
                token: None,
                cursor: start,
                complete_list_size,
                expiration: None,
            })
        }
    }

    /// Highest numeric local id currently indexed within a namespace.
    /// Supports identifier auto-numbering.
    pub fn highest_numeric_pid(&self, namespace: &str) -> Option<i64> {
        self.index.reader().max_numeric_local_id(namespace)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    /// Flush pending mutations and force-evict every cached result.
    pub fn shutdown(&self) -> Result<()> {
        let mut writer = self.lock_writer()?;
        if writer.pending > 0 {
            if let Some(wal) = &mut writer.wal {
                wal.rotate_to_committing()?;
                self.index.commit()?;
                wal.finish_commit()?;
                writer.pending = 0;
            }
        }
        drop(writer);
        self.cache.shutdown();
        Ok(())
    }
}
