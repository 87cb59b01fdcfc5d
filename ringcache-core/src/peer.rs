//! Peer transport contract (§4.7) and the ring-backed registry that picks a
//! peer for a key and caches its transport handle (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use ringcache_common::Result;

use crate::hashring::Ring;

/// What a Group needs from a remote peer: a bounded-deadline Get/Set pair.
/// The concrete transport (TCP, in `ringcache-client`) lives outside this
/// crate; the core only depends on this trait.
#[async_trait]
pub trait PeerGetter: Send + Sync {
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>>;
    async fn set(&self, group: &str, key: &str, value: &[u8], expire_unix: i64, is_hot: bool) -> Result<()>;
}

/// Selects the peer that owns a key, or `None` when the owner is this node
/// (the Group should fall back to its local loader) or the ring has no
/// owner at all.
pub trait PeerPicker: Send + Sync {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Builds a [`PeerGetter`] handle for a bare host, e.g. `"10.0.0.2"`.
/// Injected from outside so this crate never depends on a concrete
/// transport (`ringcache-client` supplies the real one; tests supply a
/// fake).
pub type PeerFactory = Arc<dyn Fn(&str) -> Arc<dyn PeerGetter> + Send + Sync>;

fn host_of(addr: &str) -> &str {
    addr.split(':').next().unwrap_or(addr)
}

/// Name -> address -> transport-handle registry, composed with a [`Ring`].
///
/// `SetPeers` resolves names to addresses via a [`Discovery`](crate::discovery::Discovery)
/// implementation, adds each host to the ring, and lazily caches one
/// transport handle per host. `PickPeer` is the ring lookup plus a
/// self-host comparison: a key owned by this node resolves to no peer, so
/// the caller falls through to its local loader instead of round-tripping
/// to itself.
pub struct PeerRegistry {
    ring: Ring,
    self_host: String,
    factory: PeerFactory,
    handles: Mutex<HashMap<String, Arc<dyn PeerGetter>>>,
}

impl PeerRegistry {
    /// `self_addr` is this node's own address (`host:port` or bare host);
    /// only the host portion is ever compared.
    pub fn new(replicas: usize, self_addr: &str, factory: PeerFactory) -> Self {
        PeerRegistry {
            ring: Ring::new(replicas),
            self_host: host_of(self_addr).to_string(),
            factory,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Adds `host` to the ring and lazily creates its transport handle if
    /// one isn't cached yet. Resolution (name -> address) is the caller's
    /// job; this method takes the already resolved host.
    pub fn add_peer_host(&self, host: &str) {
        self.ring.add_nodes([host]);
        let mut handles = self.handles.lock();
        handles
            .entry(host.to_string())
            .or_insert_with(|| (self.factory)(host));
    }

    /// Looks up the owner of `key` via the ring and removes it, both from
    /// the ring and the cached handle. This is the ring-level response to a
    /// deadline/unreachability signal an outer layer observed; the Group
    /// itself never calls this automatically.
    pub fn remove_peer_by_key(&self, key: &str) {
        if let Some(owner) = self.ring.get(key) {
            self.ring.remove(&owner);
            self.handles.lock().remove(&owner);
        }
    }

    pub fn self_host(&self) -> &str {
        &self.self_host
    }
}

impl PeerPicker for PeerRegistry {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let owner = self.ring.get(key)?;
        if owner.is_empty() || owner == self.self_host {
            return None;
        }
        self.handles.lock().get(&owner).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullPeer;

    #[async_trait]
    impl PeerGetter for NullPeer {
        async fn get(&self, _group: &str, _key: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn set(&self, _group: &str, _key: &str, _value: &[u8], _expire_unix: i64, _is_hot: bool) -> Result<()> {
            Ok(())
        }
    }

    fn factory() -> PeerFactory {
        Arc::new(|_host: &str| Arc::new(NullPeer) as Arc<dyn PeerGetter>)
    }

    #[test]
    fn pick_peer_returns_none_for_self_host() {
        let registry = PeerRegistry::new(10, "10.0.0.1:8888", factory());
        registry.add_peer_host("10.0.0.1");
        registry.add_peer_host("10.0.0.2");

        // whichever key maps to 10.0.0.1 must come back as "no remote".
        for key in ["a", "b", "c", "d", "e"] {
            if let Some(owner) = registry.ring.get(key) {
                if owner == "10.0.0.1" {
                    assert!(registry.pick_peer(key).is_none());
                } else {
                    assert!(registry.pick_peer(key).is_some());
                }
            }
        }
    }

    #[test]
    fn empty_ring_has_no_owner() {
        let registry = PeerRegistry::new(10, "10.0.0.1", factory());
        assert!(registry.pick_peer("anything").is_none());
    }

    #[test]
    fn remove_peer_by_key_drops_both_ring_entry_and_handle() {
        let registry = PeerRegistry::new(10, "10.0.0.1", factory());
        registry.add_peer_host("10.0.0.2");
        assert!(registry.pick_peer("x").is_some() || registry.ring.get("x").is_none());
        registry.remove_peer_by_key("x");
        assert!(registry.ring.is_empty());
    }
}
