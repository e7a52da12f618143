use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error};
use uuid::Uuid;
use crate::catalog::FieldSpec;
use crate::core::stats::EngineStats;
use crate::search::accumulator::PidList;

/// A paged search in progress: the accumulator, the requested result
/// fields, and the pagination cursor. Lives in the cache between resume
/// calls under its current token.
pub struct Session {
    pub pids: PidList,
    pub fields: Vec<&'static FieldSpec>,
    pub max_results: usize,
    pub cursor: usize,
    pub expires: DateTime<Utc>,
}

impl Session {
    fn dispose(mut self) {
        if let Err(err) = self.pids.dispose() {
            error!(%err, "failed to release an evicted result");
        }
    }
}

struct ShutdownSignal {
    done: Mutex<bool>,
    wake: Condvar,
}

/// Token-addressed, time-expiring store of paged results. A single
/// background sweeper, scheduled at a fixed period equal to the configured
/// lifetime, evicts whatever has expired.
pub struct ResultCache {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    lifetime: Duration,
    signal: Arc<ShutdownSignal>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

/// Fresh opaque resumption token.
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

impl ResultCache {
    pub fn start(lifetime_secs: u64, stats: Arc<EngineStats>) -> Self {
        let sessions: Arc<RwLock<HashMap<String, Session>>> = Arc::new(RwLock::new(HashMap::new()));
        let lifetime = Duration::from_secs(lifetime_secs);
        let signal = Arc::new(ShutdownSignal {
            done: Mutex::new(false),
            wake: Condvar::new(),
        });

        let sweeper = {
            let sessions = sessions.clone();
            let signal = signal.clone();
            std::thread::spawn(move || {
                loop {
                    let mut done = signal.done.lock();
                    if *done {
                        break;
                    }
                    let _ = signal.wake.wait_for(&mut done, lifetime);
                    if *done {
                        break;
                    }
                    drop(done);
                    sweep(&sessions, &stats);
                }
            })
        };

        ResultCache {
            sessions,
            lifetime,
            signal,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn insert(&self, token: String, session: Session) {
        self.sessions.write().insert(token, session);
    }

    /// Claim a session by token. The caller either terminates it or
    /// re-registers it under a fresh token.
    pub fn take(&self, token: &str) -> Option<Session> {
        self.sessions.write().remove(token)
    }

    /// Stop the sweeper and force-evict every remaining result.
    pub fn shutdown(&self) {
        let handle = {
            let mut done = self.signal.done.lock();
            if *done {
                None
            } else {
                *done = true;
                self.signal.wake.notify_all();
                self.sweeper.lock().take()
            }
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }

        let drained: Vec<Session> = {
            let mut sessions = self.sessions.write();
            sessions.drain().map(|(_, session)| session).collect()
        };
        for session in drained {
            session.dispose();
        }
    }
}

impl Drop for ResultCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sweep(sessions: &RwLock<HashMap<String, Session>>, stats: &EngineStats) {
    let now = Utc::now();
    let expired: Vec<Session> = {
        let mut sessions = sessions.write();
        let tokens: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| session.expires <= now)
            .map(|(token, _)| token.clone())
            .collect();
        tokens
            .into_iter()
            .filter_map(|token| sessions.remove(&token))
            .collect()
    };
    if !expired.is_empty() {
        debug!(count = expired.len(), "sweeping expired search results");
        stats
            .sessions_expired
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        for session in expired {
            session.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn session(expires: DateTime<Utc>) -> Session {
        Session {
            pids: PidList::new(10, PathBuf::from(".")),
            fields: Vec::new(),
            max_results: 10,
            cursor: 0,
            expires,
        }
    }

    #[test]
    fn take_removes_the_entry() {
        let cache = ResultCache::start(60, Arc::new(EngineStats::new()));
        cache.insert("t1".to_string(), session(Utc::now()));
        assert!(cache.take("t1").is_some());
        assert!(cache.take("t1").is_none());
        cache.shutdown();
    }

    #[test]
    fn sweep_evicts_only_expired_sessions() {
        let stats = Arc::new(EngineStats::new());
        let cache = ResultCache::start(3600, stats.clone());
        cache.insert(
            "old".to_string(),
            session(Utc::now() - chrono::Duration::seconds(5)),
        );
        cache.insert(
            "fresh".to_string(),
            session(Utc::now() + chrono::Duration::seconds(3600)),
        );

        sweep(&cache.sessions, &stats);
        assert!(cache.take("old").is_none());
        assert!(cache.take("fresh").is_some());
        assert_eq!(stats.snapshot().sessions_expired, 1);
        cache.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let cache = ResultCache::start(60, Arc::new(EngineStats::new()));
        cache.insert("t".to_string(), session(Utc::now()));
        cache.shutdown();
        cache.shutdown();
        assert!(cache.is_empty());
    }
}
