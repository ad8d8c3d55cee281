//! Versioned per-file content cache
//!
//! Holds the client replica of every open file. Correctness under message
//! reordering comes from one rule: a write only lands when its version is
//! strictly newer than what is cached (or carries no version at all, the
//! optimistic local-edit case). Stale writes are a silent, debug-logged
//! no-op, never an error.
//!
//! The pending guard prevents two concurrent fetches for the same file:
//! consumers must check-then-set it before going to the network. The guard
//! auto-expires so a fetch that dies without cleanup cannot wedge a file.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use syncroom_core::{Clock, FileId, FileState, SyncConfig, UserId};

struct CacheEntry {
    state: FileState,
    /// When content last changed (drives freshness)
    updated_at: DateTime<Utc>,
    /// When the entry was last read or written (drives eviction)
    touched_at: DateTime<Utc>,
}

/// Per-room file content cache
pub struct FileCache {
    entries: HashMap<FileId, CacheEntry>,
    pending: HashMap<FileId, DateTime<Utc>>,
    freshness: chrono::Duration,
    pending_guard: chrono::Duration,
    idle_eviction: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    pub fn new(config: &SyncConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            pending: HashMap::new(),
            freshness: config.cache_freshness,
            pending_guard: config.pending_guard,
            idle_eviction: config.cache_idle_eviction,
            clock,
        }
    }

    /// Look up a file, touching it for eviction purposes.
    pub fn get(&mut self, file: &FileId) -> Option<&FileState> {
        let now = self.clock.now();
        self.entries.get_mut(file).map(|entry| {
            entry.touched_at = now;
            &entry.state
        })
    }

    /// Cached version for a file, if any.
    pub fn version(&self, file: &FileId) -> Option<u64> {
        self.entries.get(file).map(|e| e.state.version)
    }

    /// Write content for a file.
    ///
    /// `version: None` is an optimistic local write and always lands,
    /// keeping the cached version number. `Some(v)` lands only when `v`
    /// exceeds the cached version; anything else is a stale write and is
    /// dropped silently. Returns whether the write landed.
    pub fn put(
        &mut self,
        file: &FileId,
        content: impl Into<String>,
        version: Option<u64>,
        user: Option<UserId>,
    ) -> bool {
        let now = self.clock.now();
        match self.entries.get_mut(file) {
            Some(entry) => {
                match version {
                    None => {
                        entry.state.content = content.into();
                    }
                    Some(v) if v > entry.state.version => {
                        entry.state.content = content.into();
                        entry.state.version = v;
                    }
                    Some(v) => {
                        debug!(
                            file = %file,
                            incoming = v,
                            cached = entry.state.version,
                            "stale write rejected"
                        );
                        return false;
                    }
                }
                entry.state.last_modified = now;
                entry.state.last_editor = user;
                entry.updated_at = now;
                entry.touched_at = now;
                true
            }
            None => {
                let mut state =
                    FileState::new(file.clone(), content, version.unwrap_or(0), now);
                state.last_editor = user;
                self.entries.insert(
                    file.clone(),
                    CacheEntry {
                        state,
                        updated_at: now,
                        touched_at: now,
                    },
                );
                true
            }
        }
    }

    /// Hydrate the cache from a room-join payload.
    pub fn batch_put(&mut self, files: Vec<FileState>) {
        for state in files {
            self.put(
                &state.file_id.clone(),
                state.content,
                Some(state.version),
                state.last_editor,
            );
        }
    }

    /// Whether the cached content is recent enough to serve without a fetch.
    pub fn is_fresh(&self, file: &FileId) -> bool {
        match self.entries.get(file) {
            Some(entry) => self.clock.now() - entry.updated_at < self.freshness,
            None => false,
        }
    }

    /// Whether a fetch for this file is already in flight.
    ///
    /// An expired guard counts as not pending; a fetch that never cleared
    /// its flag stops blocking after the guard window.
    pub fn is_pending(&self, file: &FileId) -> bool {
        match self.pending.get(file) {
            Some(marked_at) => self.clock.now() - *marked_at < self.pending_guard,
            None => false,
        }
    }

    /// Check-then-set the pending guard.
    ///
    /// Returns false when a live guard already exists, in which case the
    /// caller must not issue a fetch.
    pub fn mark_pending(&mut self, file: &FileId) -> bool {
        if self.is_pending(file) {
            return false;
        }
        self.pending.insert(file.clone(), self.clock.now());
        true
    }

    pub fn clear_pending(&mut self, file: &FileId) {
        self.pending.remove(file);
    }

    /// Evict entries untouched longer than the idle window.
    ///
    /// Driven by the session scheduler on the sweep interval. Returns the
    /// number of evicted entries.
    pub fn sweep(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        let idle = self.idle_eviction;
        self.entries.retain(|_, e| now - e.touched_at <= idle);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "cache sweep");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use syncroom_core::ManualClock;

    fn cache_with_clock() -> (FileCache, ManualClock) {
        let clock = ManualClock::new();
        let cache = FileCache::new(&SyncConfig::default(), Arc::new(clock.clone()));
        (cache, clock)
    }

    fn f(id: &str) -> FileId {
        FileId::new(id)
    }

    #[test]
    fn test_put_and_get() {
        let (mut cache, _clock) = cache_with_clock();
        assert!(cache.put(&f("f1"), "hello", Some(1), Some(UserId::new("u1"))));
        let state = cache.get(&f("f1")).unwrap();
        assert_eq!(state.content, "hello");
        assert_eq!(state.version, 1);
        assert_eq!(state.last_editor, Some(UserId::new("u1")));
    }

    #[test]
    fn test_stale_write_is_silent_noop() {
        // Scenario: cached v3; put v2 rejected, put v4 accepted.
        let (mut cache, _clock) = cache_with_clock();
        cache.put(&f("f1"), "three", Some(3), None);

        assert!(!cache.put(&f("f1"), "x", Some(2), Some(UserId::new("u1"))));
        assert_eq!(cache.get(&f("f1")).unwrap().content, "three");
        assert_eq!(cache.version(&f("f1")), Some(3));

        assert!(cache.put(&f("f1"), "y", Some(4), Some(UserId::new("u2"))));
        assert_eq!(cache.get(&f("f1")).unwrap().content, "y");
        assert_eq!(cache.version(&f("f1")), Some(4));
    }

    #[test]
    fn test_equal_version_is_stale() {
        let (mut cache, _clock) = cache_with_clock();
        cache.put(&f("f1"), "a", Some(3), None);
        assert!(!cache.put(&f("f1"), "b", Some(3), None));
        assert_eq!(cache.get(&f("f1")).unwrap().content, "a");
    }

    #[test]
    fn test_versionless_put_is_optimistic_local_write() {
        let (mut cache, _clock) = cache_with_clock();
        cache.put(&f("f1"), "server", Some(5), None);
        assert!(cache.put(&f("f1"), "local edit", None, Some(UserId::new("me"))));
        let state = cache.get(&f("f1")).unwrap();
        assert_eq!(state.content, "local edit");
        // Version untouched; the server still owns numbering.
        assert_eq!(state.version, 5);
    }

    #[test]
    fn test_version_is_monotonic_under_any_put_sequence() {
        let (mut cache, _clock) = cache_with_clock();
        let versions = [3u64, 1, 4, 4, 2, 9, 5];
        let mut high = 0;
        for v in versions {
            cache.put(&f("f1"), format!("v{v}"), Some(v), None);
            let cached = cache.version(&f("f1")).unwrap();
            assert!(cached >= high);
            high = cached;
        }
        assert_eq!(high, 9);
    }

    #[test]
    fn test_freshness_window() {
        let (mut cache, clock) = cache_with_clock();
        cache.put(&f("f1"), "x", Some(1), None);
        assert!(cache.is_fresh(&f("f1")));

        clock.advance(Duration::seconds(31));
        assert!(!cache.is_fresh(&f("f1")));
        assert!(!cache.is_fresh(&f("missing")));
    }

    #[test]
    fn test_pending_guard_check_then_set() {
        let (mut cache, clock) = cache_with_clock();
        assert!(!cache.is_pending(&f("f1")));
        assert!(cache.mark_pending(&f("f1")));
        // Second marker loses the race.
        assert!(!cache.mark_pending(&f("f1")));
        assert!(cache.is_pending(&f("f1")));

        clock.advance(Duration::seconds(6));
        // Guard auto-expired; a new fetch may proceed.
        assert!(!cache.is_pending(&f("f1")));
        assert!(cache.mark_pending(&f("f1")));

        cache.clear_pending(&f("f1"));
        assert!(!cache.is_pending(&f("f1")));
    }

    #[test]
    fn test_batch_put_hydrates() {
        let (mut cache, clock) = cache_with_clock();
        let now = clock.now();
        cache.batch_put(vec![
            FileState::new(f("a.js"), "aaa", 1, now),
            FileState::new(f("b.js"), "bbb", 2, now),
        ]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&f("b.js")).unwrap().content, "bbb");
    }

    #[test]
    fn test_sweep_evicts_idle_entries() {
        let (mut cache, clock) = cache_with_clock();
        cache.put(&f("old"), "x", Some(1), None);

        clock.advance(Duration::minutes(4));
        cache.put(&f("new"), "y", Some(1), None);
        // Reading counts as a touch.
        assert!(cache.get(&f("old")).is_some());

        clock.advance(Duration::minutes(4));
        cache.put(&f("newer"), "z", Some(1), None);

        // "old" touched 4m ago, "new" 4m ago, "newer" now: nothing idle > 5m.
        assert_eq!(cache.sweep(), 0);

        clock.advance(Duration::minutes(2));
        // "old" and "new" now idle for 6m.
        assert_eq!(cache.sweep(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&f("newer")).is_some());
    }

    #[test]
    fn test_custom_windows_from_config() {
        let clock = ManualClock::new();
        let config = SyncConfig {
            cache_freshness: Duration::milliseconds(50),
            pending_guard: Duration::milliseconds(20),
            ..SyncConfig::default()
        };
        let mut cache = FileCache::new(&config, Arc::new(clock.clone()));

        cache.put(&f("f1"), "x", Some(1), None);
        cache.mark_pending(&f("f1"));
        clock.advance(Duration::milliseconds(30));
        assert!(cache.is_fresh(&f("f1")));
        assert!(!cache.is_pending(&f("f1")));

        clock.advance(Duration::milliseconds(30));
        assert!(!cache.is_fresh(&f("f1")));
    }
}
