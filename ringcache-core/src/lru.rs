//! Byte-budgeted LRU engine with sliding-window expiration and jitter.
//!
//! ## Structure
//!
//! ```text
//! Lru<V>
//!   └── inner: Mutex<Inner<V>>
//!         ├── map: HashMap<Arc<str>, usize>
//!         ├── nodes: Vec<Option<Entry<V>>>
//!         ├── free: Vec<usize>
//!         └── head/tail: recency-list indices (head = least, tail = most recent)
//! ```
//!
//! Nodes live in a dense arena and are linked by index rather than pointer,
//! so the list can be walked and spliced without unsafe code.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;

use ringcache_common::CacheValue;

/// Default spread for expiration jitter: a three-minute window.
pub const DEFAULT_EXPIRE_RANDOM: Duration = Duration::from_secs(180);

struct Entry<V> {
    key: Arc<str>,
    value: V,
    expire: Instant,
    added_at: Instant,
    size: i64,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<V> {
    map: std::collections::HashMap<Arc<str>, usize>,
    nodes: Vec<Option<Entry<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    nbytes: i64,
}

impl<V> Inner<V> {
    fn new() -> Self {
        Inner {
            map: std::collections::HashMap::new(),
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            nbytes: 0,
        }
    }

    fn list_remove(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().expect("node exists");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
        let node = self.nodes[idx].as_mut().unwrap();
        node.prev = None;
        node.next = None;
    }

    /// Splices `idx` onto the front (most-recently-used end) of the list.
    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.nodes[idx].as_mut().unwrap();
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.nodes[h].as_mut().unwrap().prev = Some(idx);
        } else {
            self.tail = Some(idx);
        }
        self.head = Some(idx);
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.list_remove(idx);
        self.push_front(idx);
    }

    fn remove_idx(&mut self, idx: usize) -> Entry<V> {
        self.list_remove(idx);
        let entry = self.nodes[idx].take().expect("node exists");
        self.map.remove(&entry.key);
        self.free.push(idx);
        self.nbytes -= entry.key.len() as i64 + entry.size;
        entry
    }
}

/// A single LRU tier: byte-bounded, expiration-aware, with an optional
/// eviction callback.
///
/// Every operation takes the same mutex: one mutex per instance, eviction
/// callback invoked while still held.
pub struct Lru<V: CacheValue> {
    max_bytes: i64,
    expire_random: Duration,
    on_evicted: Option<Box<dyn Fn(&str, &V) + Send + Sync>>,
    inner: Mutex<Inner<V>>,
}

impl<V: CacheValue> Lru<V> {
    /// Builds a new engine. `max_bytes <= 0` disables the byte budget.
    pub fn new(max_bytes: i64) -> Self {
        Lru {
            max_bytes,
            expire_random: DEFAULT_EXPIRE_RANDOM,
            on_evicted: None,
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Attaches an eviction callback, run under the lock after the entry is
    /// unlinked. Must not re-enter this engine.
    pub fn with_on_evicted<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &V) + Send + Sync + 'static,
    {
        self.on_evicted = Some(Box::new(callback));
        self
    }

    /// Overrides the jitter window (test hook; production code keeps the
    /// default).
    pub fn with_expire_random(mut self, window: Duration) -> Self {
        self.expire_random = window;
        self
    }

    fn jitter(&self) -> Duration {
        let bound_nanos = self.expire_random.as_nanos();
        if bound_nanos == 0 {
            return Duration::ZERO;
        }
        let bound_nanos = u64::try_from(bound_nanos).unwrap_or(u64::MAX);
        let nanos = rand::thread_rng().gen_range(0..bound_nanos);
        Duration::from_nanos(nanos)
    }

    /// Inserts or replaces `key`, spreading `expire` by a random jitter, and
    /// evicts from the back while over budget.
    pub fn add(&self, key: &str, value: V, expire: Instant) {
        let jittered = expire + self.jitter();
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if let Some(&idx) = inner.map.get(key) {
            inner.move_to_front(idx);
            let node = inner.nodes[idx].as_mut().unwrap();
            let delta = value.cache_len() as i64 - node.size;
            node.value = value;
            node.size += delta;
            node.expire = jittered;
            inner.nbytes += delta;
        } else {
            let size = value.cache_len() as i64;
            let key: Arc<str> = Arc::from(key);
            let idx = inner.free.pop().unwrap_or_else(|| {
                inner.nodes.push(None);
                inner.nodes.len() - 1
            });
            inner.nodes[idx] = Some(Entry {
                key: Arc::clone(&key),
                value,
                expire: jittered,
                added_at: now,
                size,
                prev: None,
                next: None,
            });
            inner.push_front(idx);
            inner.map.insert(key.clone(), idx);
            inner.nbytes += key.len() as i64 + size;
        }

        self.evict_over_budget(&mut inner);
    }

    fn evict_over_budget(&self, inner: &mut Inner<V>) {
        while self.max_bytes > 0 && inner.nbytes > self.max_bytes {
            let Some(tail) = inner.tail else { break };
            let entry = inner.remove_idx(tail);
            if let Some(cb) = &self.on_evicted {
                cb(&entry.key, &entry.value);
            }
        }
    }

    /// Looks up `key`. A fresh hit slides the expiration forward by the
    /// entry's original residency window and moves it to the front; an
    /// expired hit is evicted and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let &idx = inner.map.get(key)?;

        if inner.nodes[idx].as_ref().unwrap().expire <= now {
            let entry = inner.remove_idx(idx);
            if let Some(cb) = &self.on_evicted {
                cb(&entry.key, &entry.value);
            }
            return None;
        }

        let node = inner.nodes[idx].as_mut().unwrap();
        let residency = node.expire.saturating_duration_since(node.added_at);
        node.expire = now + residency;
        node.added_at = now;
        let value = node.value.clone();
        inner.move_to_front(idx);
        Some(value)
    }

    /// Removes `key` unconditionally, firing the eviction callback if present.
    pub fn remove(&self, key: &str) {
        let mut inner = self.inner.lock();
        if let Some(&idx) = inner.map.get(key) {
            let entry = inner.remove_idx(idx);
            if let Some(cb) = &self.on_evicted {
                cb(&entry.key, &entry.value);
            }
        }
    }

    /// Evicts the single least-recently-used entry, if any.
    pub fn remove_oldest(&self) {
        let mut inner = self.inner.lock();
        if let Some(tail) = inner.tail {
            let entry = inner.remove_idx(tail);
            if let Some(cb) = &self.on_evicted {
                cb(&entry.key, &entry.value);
            }
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// True when the engine holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current byte accounting (Σ key.len() + value.cache_len() over live
    /// entries).
    pub fn nbytes(&self) -> i64 {
        self.inner.lock().nbytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringcache_common::ByteView;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn view(bytes: &[u8]) -> ByteView {
        ByteView::new(bytes.to_vec(), Instant::now() + Duration::from_secs(3600))
    }

    fn no_jitter<V: CacheValue>(lru: Lru<V>) -> Lru<V> {
        lru.with_expire_random(Duration::ZERO)
    }

    #[test]
    fn byte_budget_evicts_the_oldest_entry() {
        // scenario: New(maxBytes=6); two 4-byte-cost entries (1-byte key + 3-byte value).
        let lru = no_jitter(Lru::<ByteView>::new(6));
        let far_future = Instant::now() + Duration::from_secs(3600);
        lru.add("k1", view(b"aaa"), far_future);
        lru.add("k2", view(b"bbb"), far_future);

        assert!(lru.get("k1").is_none(), "k1 should have been evicted");
        assert!(lru.get("k2").is_some(), "k2 should remain");
        assert!(lru.nbytes() <= 6);
    }

    #[test]
    fn expiration_on_access_reports_a_miss_and_clears_the_entry() {
        let lru = no_jitter(Lru::<ByteView>::new(0));
        let past = Instant::now() - Duration::from_secs(1);
        lru.add("k", view(b"v"), past);

        assert!(lru.get("k").is_none());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn recency_protects_recently_read_entries_from_eviction() {
        // a,b,c inserted; a is read (promoted); d then e are added, forcing
        // eviction. b (least recently used) must go before a.
        let lru = no_jitter(Lru::<ByteView>::new(8));
        let far_future = Instant::now() + Duration::from_secs(3600);
        lru.add("a", view(b"1"), far_future);
        lru.add("b", view(b"1"), far_future);
        lru.add("c", view(b"1"), far_future);
        assert!(lru.get("a").is_some());
        lru.add("d", view(b"1"), far_future);
        lru.add("e", view(b"1"), far_future);

        assert!(lru.get("b").is_none(), "b should be evicted first");
        assert!(lru.get("a").is_some(), "a was recently accessed, must survive");
    }

    #[test]
    fn on_evicted_runs_once_per_eviction() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let lru = no_jitter(Lru::<ByteView>::new(2).with_on_evicted(move |_k, _v| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let far_future = Instant::now() + Duration::from_secs(3600);
        lru.add("k1", view(b"1"), far_future);
        lru.add("k2", view(b"1"), far_future);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_budget_disables_eviction() {
        let lru = no_jitter(Lru::<ByteView>::new(0));
        let far_future = Instant::now() + Duration::from_secs(3600);
        for i in 0..50 {
            lru.add(&format!("k{i}"), view(b"xxxxxxxxxx"), far_future);
        }
        assert_eq!(lru.len(), 50);
    }
}
