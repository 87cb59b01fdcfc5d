//! Thin concurrency wrapper pairing a "main" and a "hot" LRU tier.

use std::time::Instant;

use ringcache_common::ByteView;

use crate::lru::Lru;

/// Byte budget floor applied when a caller asks for less than this; an
/// engine with no headroom at all is not useful and likely a config error.
const MIN_TIER_BYTES: i64 = 1024;

fn floor(max_bytes: i64) -> i64 {
    if max_bytes > 0 && max_bytes < MIN_TIER_BYTES {
        MIN_TIER_BYTES
    } else {
        max_bytes
    }
}

/// Which tier an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Main,
    Hot,
}

/// Two independent LRU engines behind one handle: `main` for keys this node
/// owns, `hot` for replicated values whose owner is a peer.
pub struct TieredCache {
    main: Lru<ByteView>,
    hot: Lru<ByteView>,
}

impl TieredCache {
    pub fn new(main_max_bytes: i64, hot_max_bytes: i64) -> Self {
        TieredCache {
            main: Lru::new(floor(main_max_bytes)),
            hot: Lru::new(floor(hot_max_bytes)),
        }
    }

    fn engine(&self, tier: Tier) -> &Lru<ByteView> {
        match tier {
            Tier::Main => &self.main,
            Tier::Hot => &self.hot,
        }
    }

    /// Inserts `value` for `key` into `tier`, expiring at `expire`.
    pub fn add(&self, tier: Tier, key: &str, value: ByteView, expire: Instant) {
        self.engine(tier).add(key, value, expire);
    }

    /// Looks up `key` in `tier`.
    pub fn get(&self, tier: Tier, key: &str) -> Option<ByteView> {
        self.engine(tier).get(key)
    }

    /// Looks up `key` in main first, then hot, matching the Group's probe
    /// order.
    pub fn get_either(&self, key: &str) -> Option<ByteView> {
        self.main.get(key).or_else(|| self.hot.get(key))
    }

    pub fn main(&self) -> &Lru<ByteView> {
        &self.main
    }

    pub fn hot(&self) -> &Lru<ByteView> {
        &self.hot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn main_and_hot_are_independent() {
        let cache = TieredCache::new(0, 0);
        let far_future = Instant::now() + Duration::from_secs(3600);
        cache.add(Tier::Main, "k", ByteView::new(b"main".to_vec(), far_future), far_future);
        cache.add(Tier::Hot, "k", ByteView::new(b"hot".to_vec(), far_future), far_future);

        assert_eq!(cache.get(Tier::Main, "k").unwrap().byte_slice(), b"main");
        assert_eq!(cache.get(Tier::Hot, "k").unwrap().byte_slice(), b"hot");
    }

    #[test]
    fn get_either_probes_main_before_hot() {
        let cache = TieredCache::new(0, 0);
        let far_future = Instant::now() + Duration::from_secs(3600);
        cache.add(Tier::Hot, "k", ByteView::new(b"hot".to_vec(), far_future), far_future);
        assert_eq!(cache.get_either("k").unwrap().byte_slice(), b"hot");

        cache.add(Tier::Main, "k", ByteView::new(b"main".to_vec(), far_future), far_future);
        assert_eq!(cache.get_either("k").unwrap().byte_slice(), b"main");
    }

    #[test]
    fn tiny_budgets_are_floored() {
        let cache = TieredCache::new(1, 1);
        let far_future = Instant::now() + Duration::from_secs(3600);
        for i in 0..10 {
            cache.add(
                Tier::Main,
                &format!("k{i}"),
                ByteView::new(vec![0u8; 8], far_future),
                far_future,
            );
        }
        assert_eq!(cache.main().len(), 10, "floor should prevent over-aggressive eviction");
    }
}
