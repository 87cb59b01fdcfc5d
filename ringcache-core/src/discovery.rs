//! Service-discovery contract.
//!
//! The mechanism itself (an etcd lease, a DNS SRV record, a static config
//! file) is explicitly out of the core's scope; this module only defines
//! the seam a production deployment plugs into, plus a static in-memory
//! implementation that's enough to run a real cluster of processes on
//! known addresses without standing up an external discovery service.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use ringcache_common::{Error, Result};

/// Name -> address resolution, plus registration with a leased, periodically
/// renewed liveness record. Bootstrap-time readiness polling across a whole
/// peer set is deliberately not part of this trait; that belongs to the
/// layer that knows the full peer list, not to a single lookup/register
/// seam.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Resolves a peer name to its current address.
    async fn resolve(&self, name: &str) -> Result<String>;

    /// Registers this node's own name/address under a lease, renewed every
    /// `lease_ttl` until the caller stops renewing it; implementations
    /// should let the record expire automatically on renewal failure
    /// rather than requiring an explicit deregister.
    async fn register(&self, name: &str, addr: &str, lease_ttl: Duration) -> Result<()>;
}

/// A fixed, config-supplied name -> address table. No lease or liveness
/// behavior: `register` is a no-op that always succeeds, since there is
/// nothing to expire. A real etcd-backed (or similar) adapter is out of
/// scope here — this crate does not ship an etcd client; a production
/// deployment implements [`Discovery`] against whatever registry it
/// actually runs.
pub struct StaticDiscovery {
    table: HashMap<String, String>,
}

impl StaticDiscovery {
    pub fn new(table: HashMap<String, String>) -> Self {
        StaticDiscovery { table }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn resolve(&self, name: &str) -> Result<String> {
        self.table
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Internal(format!("no known address for peer {name}")))
    }

    async fn register(&self, _name: &str, _addr: &str, _lease_ttl: Duration) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_known_names_and_rejects_unknown_ones() {
        let table = HashMap::from([("node-a".to_string(), "10.0.0.1:8888".to_string())]);
        let discovery = StaticDiscovery::new(table);
        assert_eq!(discovery.resolve("node-a").await.unwrap(), "10.0.0.1:8888");
        assert!(discovery.resolve("node-b").await.is_err());
    }

    #[tokio::test]
    async fn register_is_a_no_op_that_always_succeeds() {
        let discovery = StaticDiscovery::new(HashMap::new());
        discovery
            .register("node-a", "10.0.0.1:8888", Duration::from_secs(10))
            .await
            .unwrap();
    }
}
