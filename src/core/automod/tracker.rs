// Per-key expiring state store backing the rate-tracking detectors
// (spam, mass mention, duplicate text).
//
// Every live entry owns exactly one armed expiry timer. `upsert` aborts
// the previous timer before arming a new one, and each timer carries a
// generation stamp so a fire that lost the abort race never deletes
// refreshed state. Operations on one key are linearized by the map's
// entry lock; distinct keys are independent.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::automod_models::MessageRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedDetector {
    Spam,
    MassMention,
    DupText,
}

/// Key of one sliding window: exactly one live entry may exist per
/// (detector, guild, user) at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackerKey {
    pub detector: TrackedDetector,
    pub guild_id: u64,
    pub user_id: u64,
}

/// Snapshot of a window's state. What `get` and `upsert` hand out;
/// the live entry (with its timer) never leaves the cache.
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    pub count: u32,
    pub last_content: String,
    pub last_at: Option<DateTime<Utc>>,
    pub messages: Vec<MessageRef>,
}

struct TrackerEntry {
    state: TrackerState,
    generation: u64,
    timer: JoinHandle<()>,
}

impl Drop for TrackerEntry {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

pub struct TrackerCache {
    entries: Arc<DashMap<TrackerKey, TrackerEntry>>,
    generation: AtomicU64,
}

impl Default for TrackerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackerCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Read-modify-write the state under `key` and re-arm its expiry
    /// timer for `ttl`. `update` sees the previous state, if any.
    pub fn upsert(
        &self,
        key: TrackerKey,
        ttl: Duration,
        update: impl FnOnce(Option<&TrackerState>) -> TrackerState,
    ) -> TrackerState {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.timer.abort();
                entry.state = update(Some(&entry.state));
                entry.generation = generation;
                entry.timer = self.arm(key, ttl, generation);
                entry.state.clone()
            }
            Entry::Vacant(vacant) => {
                let state = update(None);
                vacant.insert(TrackerEntry {
                    state: state.clone(),
                    generation,
                    timer: self.arm(key, ttl, generation),
                });
                state
            }
        }
    }

    pub fn get(&self, key: &TrackerKey) -> Option<TrackerState> {
        self.entries.get(key).map(|entry| entry.state.clone())
    }

    pub fn delete(&self, key: &TrackerKey) {
        self.entries.remove(key);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn arm(&self, key: TrackerKey, ttl: Duration, generation: u64) -> JoinHandle<()> {
        let entries = Arc::clone(&self.entries);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            entries.remove_if(&key, |_, entry| entry.generation == generation);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user_id: u64) -> TrackerKey {
        TrackerKey {
            detector: TrackedDetector::Spam,
            guild_id: 1,
            user_id,
        }
    }

    fn bump(prev: Option<&TrackerState>) -> TrackerState {
        TrackerState {
            count: prev.map(|s| s.count).unwrap_or(0) + 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let cache = TrackerCache::new();
        cache.upsert(key(1), Duration::from_millis(50), bump);
        assert!(cache.get(&key(1)).is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get(&key(1)).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn refresh_extends_the_window() {
        let cache = TrackerCache::new();
        cache.upsert(key(1), Duration::from_millis(100), bump);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let state = cache.upsert(key(1), Duration::from_millis(100), bump);
        assert_eq!(state.count, 2);

        // Original timer would have fired by now; the refresh cancelled it.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(cache.get(&key(1)).map(|s| s.count), Some(2));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get(&key(1)).is_none());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let cache = TrackerCache::new();
        cache.upsert(key(1), Duration::from_millis(40), bump);
        cache.upsert(key(2), Duration::from_millis(500), bump);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.get(&key(1)).is_none());
        assert!(cache.get(&key(2)).is_some());
    }

    #[tokio::test]
    async fn delete_drops_the_entry_immediately() {
        let cache = TrackerCache::new();
        cache.upsert(key(1), Duration::from_secs(60), bump);
        cache.delete(&key(1));
        assert!(cache.get(&key(1)).is_none());
    }
}
