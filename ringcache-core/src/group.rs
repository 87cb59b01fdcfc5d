//! Group coordinator: the public `Get`/`Set` surface, composing the tiered
//! cache, the coalescer, the application loader, and the peer picker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use ringcache_common::{instant_to_unix_secs, unix_secs_to_instant, ByteView, Error, Result};

use crate::coalesce::Coalescer;
use crate::getter::Getter;
use crate::peer::PeerPicker;
use crate::tiered::{Tier, TieredCache};

/// Default residency window applied to a value freshly loaded from the
/// application's source of truth.
pub const DEFAULT_EXPIRE: Duration = Duration::from_secs(30);

/// A named bundle of a loader, a main cache, a hot cache, a peer picker,
/// and a request coalescer.
///
/// A Group's peer-picker can be registered exactly once
/// ([`Group::register_peers`]); attempting a second registration is a
/// programming error and panics.
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    cache: TieredCache,
    peers: RwLock<Option<Arc<dyn PeerPicker>>>,
    loader: Coalescer<ByteView>,
}

impl Group {
    pub fn new(name: impl Into<String>, main_max_bytes: i64, hot_max_bytes: i64, getter: Arc<dyn Getter>) -> Self {
        Group {
            name: name.into(),
            getter,
            cache: TieredCache::new(main_max_bytes, hot_max_bytes),
            peers: RwLock::new(None),
            loader: Coalescer::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn main_cache_len(&self) -> usize {
        self.cache.main().len()
    }

    pub fn hot_cache_len(&self) -> usize {
        self.cache.hot().len()
    }

    /// One-shot peer-picker registration. Panics if called twice on the
    /// same Group.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) {
        let mut slot = self.peers.write();
        if slot.is_some() {
            panic!("ringcache: peer already registered for group {}", self.name);
        }
        *slot = Some(picker);
    }

    /// Fetches `key`: a tiered-cache hit returns immediately; a miss routes
    /// through the coalescer to either a peer or the local loader.
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        if key.is_empty() {
            return Err(Error::InvalidArgument);
        }
        if let Some(hit) = self.cache.get_either(key) {
            return Ok(hit);
        }
        self.load(key).await
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        self.loader
            .do_once(key, || async move {
                let picker = self.peers.read().clone();
                if let Some(picker) = picker {
                    if let Some(peer) = picker.pick_peer(key) {
                        return match peer.get(&self.name, key).await {
                            Ok(bytes) => {
                                // The peer already owns and caches the authoritative
                                // copy, so this view is not inserted into the local main
                                // tier. Its expire is set to "now" (already expired)
                                // since it must never be mistaken for a fresh local
                                // entry; callers that want local replication issue an
                                // explicit Set(is_hot=true).
                                Ok(ByteView::new(bytes, Instant::now()))
                            }
                            Err(err) => Err(err),
                        };
                    }
                }
                self.get_locally(key).await
            })
            .await
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = self.getter.get(key).await?;
        let view = ByteView::new(bytes, Instant::now() + DEFAULT_EXPIRE);
        self.cache.add(Tier::Main, key, view.clone(), view.expire());
        Ok(view)
    }

    /// Stores `value` for `key`. `is_hot = true` always writes the local
    /// hot tier (no routing); otherwise the write is routed the same way a
    /// `Get` would be, landing on the owning peer's main tier or, if this
    /// node is the owner, this node's own main tier.
    pub async fn set(&self, key: &str, value: ByteView, is_hot: bool) -> Result<()> {
        if key.is_empty() {
            return Err(Error::InvalidArgument);
        }
        if is_hot {
            return self.set_hot(key, value).await;
        }

        self.loader
            .do_once(key, || async move {
                let picker = self.peers.read().clone();
                if let Some(picker) = picker {
                    if let Some(peer) = picker.pick_peer(key) {
                        let expire_unix = instant_to_unix_secs(value.expire());
                        peer.set(&self.name, key, &value.byte_slice(), expire_unix, false)
                            .await?;
                        return Ok(value);
                    }
                }
                self.cache.add(Tier::Main, key, value.clone(), value.expire());
                Ok(value)
            })
            .await?;
        Ok(())
    }

    /// Hot-tier sets still go through the coalescer, to suppress duplicate
    /// hot-write storms for the same key, but the coalesced result is
    /// discarded.
    async fn set_hot(&self, key: &str, value: ByteView) -> Result<()> {
        let _ = self
            .loader
            .do_once(key, || async move {
                self.cache.add(Tier::Hot, key, value.clone(), value.expire());
                Ok(value)
            })
            .await;
        Ok(())
    }
}

/// Wire helper: turns a `SetRequest`'s Unix-seconds `expire` field into a
/// `ByteView` ready to pass to [`Group::set`]. Lives here rather than in
/// `ringcache-common` since it's only meaningful once paired with a Group.
pub fn byte_view_from_wire(bytes: Vec<u8>, expire_unix: i64) -> ByteView {
    ByteView::new(bytes, unix_secs_to_instant(expire_unix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::getter::GetterFunc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store_getter(store: HashMap<&'static str, &'static str>) -> Arc<dyn Getter> {
        Arc::new(GetterFunc(move |key: &str| {
            store
                .get(key)
                .map(|v| v.as_bytes().to_vec())
                .ok_or_else(|| Error::NotFound(key.to_string()))
        }))
    }

    #[tokio::test]
    async fn get_populates_main_tier_and_does_not_reload_within_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let getter: Arc<dyn Getter> = Arc::new(GetterFunc(move |key: &str| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            if key == "Tom" {
                Ok(b"630".to_vec())
            } else {
                Err(Error::NotFound(key.to_string()))
            }
        }));
        let group = Group::new("scores", 1 << 20, 1 << 20, getter);

        let first = group.get("Tom").await.unwrap();
        assert_eq!(first.byte_slice(), b"630");
        assert_eq!(group.main_cache_len(), 1);

        let second = group.get("Tom").await.unwrap();
        assert_eq!(second.byte_slice(), b"630");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "second Get must hit the cache, not reload");
    }

    #[tokio::test]
    async fn get_of_unknown_key_errors_and_leaves_cache_unchanged() {
        let getter = store_getter(HashMap::from([("Tom", "630")]));
        let group = Group::new("scores", 1 << 20, 1 << 20, getter);

        let err = group.get("Unknown").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(group.main_cache_len(), 0);
    }

    #[tokio::test]
    async fn empty_key_is_rejected_on_get_and_set() {
        let getter = store_getter(HashMap::new());
        let group = Group::new("scores", 1 << 20, 1 << 20, getter);

        assert!(matches!(group.get("").await.unwrap_err(), Error::InvalidArgument));
        let value = ByteView::new(b"x".to_vec(), Instant::now() + Duration::from_secs(5));
        assert!(matches!(
            group.set("", value, false).await.unwrap_err(),
            Error::InvalidArgument
        ));
    }

    #[tokio::test]
    async fn set_with_no_peers_registered_writes_main_tier_locally() {
        let getter = store_getter(HashMap::new());
        let group = Group::new("scores", 1 << 20, 1 << 20, getter);
        let value = ByteView::new(b"589".to_vec(), Instant::now() + Duration::from_secs(30));

        group.set("Jack", value, false).await.unwrap();
        let hit = group.get("Jack").await.unwrap();
        assert_eq!(hit.byte_slice(), b"589");
    }

    #[tokio::test]
    async fn set_hot_writes_the_hot_tier_not_main() {
        let getter = store_getter(HashMap::new());
        let group = Group::new("scores", 1 << 20, 1 << 20, getter);
        let value = ByteView::new(b"hot-value".to_vec(), Instant::now() + Duration::from_secs(30));

        group.set("Sam", value, true).await.unwrap();
        assert_eq!(group.hot_cache_len(), 1);
        assert_eq!(group.main_cache_len(), 0);
        assert_eq!(group.get("Sam").await.unwrap().byte_slice(), b"hot-value");
    }

    #[tokio::test]
    async fn registering_peers_twice_panics() {
        struct NoPeers;
        impl PeerPicker for NoPeers {
            fn pick_peer(&self, _key: &str) -> Option<Arc<dyn crate::peer::PeerGetter>> {
                None
            }
        }
        let getter = store_getter(HashMap::new());
        let group = Group::new("scores", 1 << 20, 1 << 20, getter);
        group.register_peers(Arc::new(NoPeers));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            group.register_peers(Arc::new(NoPeers));
        }));
        assert!(result.is_err());
    }
}
