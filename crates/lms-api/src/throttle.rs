use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Per-identity attempt timestamps. Implementations must prune before counting.
pub trait ThrottleStore: Send + Sync {
    /// Drops entries older than `window` (relative to `now`) and returns what is left.
    fn recent(&self, key: &str, now: Instant, window: Duration) -> usize;

    /// Prunes, then appends `now`. Returns the count including the new entry.
    fn push(&self, key: &str, now: Instant, window: Duration) -> usize;

    fn clear(&self, key: &str);

    /// Prunes every identity and forgets those left with no attempts. Returns how many
    /// identities were dropped.
    fn purge_expired(&self, now: Instant, window: Duration) -> usize;
}

#[derive(Default)]
pub struct InMemoryThrottleStore {
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl InMemoryThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked_identities(&self) -> usize {
        self.hits.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn prune(q: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    // Timestamps are appended in order, so trimming the front is enough.
    while q
        .front()
        .is_some_and(|t| now.duration_since(*t) > window)
    {
        q.pop_front();
    }
}

impl ThrottleStore for InMemoryThrottleStore {
    fn recent(&self, key: &str, now: Instant, window: Duration) -> usize {
        let mut map = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let Some(q) = map.get_mut(key) else {
            return 0;
        };
        prune(q, now, window);
        let len = q.len();
        if len == 0 {
            map.remove(key);
        }
        len
    }

    fn push(&self, key: &str, now: Instant, window: Duration) -> usize {
        let mut map = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let q = map.entry(key.to_string()).or_default();
        prune(q, now, window);
        q.push_back(now);
        q.len()
    }

    fn clear(&self, key: &str) {
        let mut map = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
    }

    fn purge_expired(&self, now: Instant, window: Duration) -> usize {
        let mut map = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        let before = map.len();
        map.retain(|_, q| {
            prune(q, now, window);
            !q.is_empty()
        });
        before - map.len()
    }
}

/// Sliding-window guard against password guessing, keyed by normalized email.
///
/// Counting is coarse: two concurrent failures for the same identity may both slip
/// in under the limit.
pub struct LoginThrottle {
    limit: usize,
    window: Duration,
    store: Arc<dyn ThrottleStore>,
}

impl LoginThrottle {
    pub fn new(limit: usize, window: Duration, store: Arc<dyn ThrottleStore>) -> Self {
        Self {
            limit: limit.max(1),
            window,
            store,
        }
    }

    pub fn in_memory(limit: usize, window: Duration) -> Self {
        Self::new(limit, window, Arc::new(InMemoryThrottleStore::new()))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_blocked(&self, identity: &str) -> bool {
        self.is_blocked_at(identity, Instant::now())
    }

    pub fn record_attempt(&self, identity: &str) {
        self.record_attempt_at(identity, Instant::now());
    }

    pub fn clear(&self, identity: &str) {
        self.store.clear(&normalize(identity));
    }

    /// Forgets identities whose attempts have all aged out of the window.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        self.store.purge_expired(now, self.window)
    }

    fn is_blocked_at(&self, identity: &str, now: Instant) -> bool {
        self.store.recent(&normalize(identity), now, self.window) >= self.limit
    }

    fn record_attempt_at(&self, identity: &str, now: Instant) {
        let count = self.store.push(&normalize(identity), now, self.window);
        if count >= self.limit {
            tracing::warn!(attempts = count, "login throttle engaged");
        }
    }
}

fn normalize(identity: &str) -> String {
    identity.trim().to_lowercase()
}
