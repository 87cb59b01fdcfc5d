//! Bounded wait for peer registration before a multi-node cluster calls
//! `SetPeers`, so a cold cluster's nodes don't race each other's discovery
//! registration.

use std::time::Duration;

use ringcache_core::Discovery;

/// Number of poll attempts before giving up.
const MAX_ATTEMPTS: u32 = 15;
/// Delay between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Waits until every name in `peers` resolves through `discovery`, or
/// returns an error after [`MAX_ATTEMPTS`]. A single-node cluster (no peers
/// besides itself) returns immediately.
pub async fn wait_for_all_registered<D: Discovery + ?Sized>(discovery: &D, peers: &[String]) -> anyhow::Result<()> {
    if peers.len() <= 1 {
        return Ok(());
    }

    for attempt in 0..MAX_ATTEMPTS {
        let mut all_registered = true;
        for name in peers {
            if discovery.resolve(name).await.is_err() {
                all_registered = false;
                break;
            }
        }
        if all_registered {
            return Ok(());
        }
        tracing::info!(attempt, "waiting for other servers to register");
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    anyhow::bail!("other servers did not register in time, please check and try again later")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use ringcache_core::StaticDiscovery;

    #[tokio::test]
    async fn single_node_cluster_never_waits() {
        let discovery = StaticDiscovery::new(HashMap::new());
        wait_for_all_registered(&discovery, &["self".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn returns_immediately_once_all_peers_resolve() {
        let table = HashMap::from([
            ("a".to_string(), "10.0.0.1:8888".to_string()),
            ("b".to_string(), "10.0.0.2:8888".to_string()),
        ]);
        let discovery = StaticDiscovery::new(table);
        wait_for_all_registered(&discovery, &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
    }
}
