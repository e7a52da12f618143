use std::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Serialize};

/// Engine counters for monitoring. Owned by the facade, shared with the
/// result-cache sweeper. No ambient registries.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub updates: AtomicU64,
    pub deletes: AtomicU64,
    pub searches: AtomicU64,
    pub resumes: AtomicU64,
    pub wal_commits: AtomicU64,
    pub sessions_expired: AtomicU64,
    pub last_build_micros: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        EngineStats::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            resumes: self.resumes.load(Ordering::Relaxed),
            wal_commits: self.wal_commits.load(Ordering::Relaxed),
            sessions_expired: self.sessions_expired.load(Ordering::Relaxed),
            last_build_micros: self.last_build_micros.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub updates: u64,
    pub deletes: u64,
    pub searches: u64,
    pub resumes: u64,
    pub wal_commits: u64,
    pub sessions_expired: u64,
    pub last_build_micros: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = EngineStats::new();
        stats.updates.fetch_add(3, Ordering::Relaxed);
        stats.sessions_expired.fetch_add(1, Ordering::Relaxed);

        let snap = stats.snapshot();
        assert_eq!(snap.updates, 3);
        assert_eq!(snap.sessions_expired, 1);
        assert_eq!(snap.deletes, 0);
    }
}
