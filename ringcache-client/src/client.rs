//! # Peer Transport Client
//!
//! Purpose: Implement `ringcache_core::peer::PeerGetter` over the wire
//! protocol from `ringcache_common::wire`, with pooled TCP connections and
//! a short per-call deadline so one unreachable peer can't stall a request
//! indefinitely.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use ringcache_common::{
    decode, read_frame, write_frame, Error, ErrorResponse, GetRequest, GetResponse, MessageTag,
    Result, SetRequest, SetResponse,
};
use ringcache_core::PeerGetter;

use crate::pool::{ConnectionPool, PoolConfig};

/// Deadline applied to every Get/Set call.
pub const CALL_DEADLINE: Duration = Duration::from_secs(2);

/// Configuration for a [`PeerClient`].
#[derive(Debug, Clone)]
pub struct PeerClientConfig {
    pub addr: String,
    pub max_idle: usize,
    pub max_total: usize,
    pub connect_timeout: Duration,
    pub call_deadline: Duration,
}

impl PeerClientConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        PeerClientConfig {
            addr: addr.into(),
            max_idle: 4,
            max_total: 16,
            connect_timeout: Duration::from_secs(2),
            call_deadline: CALL_DEADLINE,
        }
    }
}

/// A pooled TCP client speaking the peer RPC wire protocol to one remote
/// node. One instance is cached per peer host by `ringcache_core::PeerRegistry`.
pub struct PeerClient {
    pool: ConnectionPool,
    call_deadline: Duration,
}

impl PeerClient {
    pub fn new(config: PeerClientConfig) -> Self {
        let call_deadline = config.call_deadline;
        let pool = ConnectionPool::new(PoolConfig {
            addr: config.addr,
            max_idle: config.max_idle,
            max_total: config.max_total,
            connect_timeout: config.connect_timeout,
        });
        PeerClient { pool, call_deadline }
    }

    /// Convenience constructor using the default pool sizing and a 2s
    /// call deadline.
    pub fn connect(addr: impl Into<String>) -> Self {
        Self::new(PeerClientConfig::new(addr))
    }

    async fn call<Req, Resp>(&self, tag: MessageTag, req: &Req) -> Result<Resp>
    where
        Req: serde::Serialize,
        Resp: for<'de> serde::Deserialize<'de>,
    {
        let mut conn = self.pool.acquire().await?;
        let outcome = timeout(self.call_deadline, async {
            write_frame(conn.stream(), tag, req).await?;
            let (resp_tag, body) = read_frame(conn.stream()).await?;
            if resp_tag == MessageTag::ErrorFrame {
                let err_resp: ErrorResponse = decode(&body)?;
                return Err(Error::from(err_resp));
            }
            decode::<Resp>(&body)
        })
        .await;

        match outcome {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(err)) => {
                conn.invalidate();
                Err(err)
            }
            Err(_) => {
                conn.invalidate();
                Err(Error::PeerUnreachable("deadline exceeded".to_string()))
            }
        }
    }
}

#[async_trait]
impl PeerGetter for PeerClient {
    async fn get(&self, group: &str, key: &str) -> Result<Vec<u8>> {
        let resp: GetResponse = self
            .call(
                MessageTag::Get,
                &GetRequest {
                    group: group.to_string(),
                    key: key.to_string(),
                },
            )
            .await?;
        Ok(resp.value)
    }

    async fn set(&self, group: &str, key: &str, value: &[u8], expire_unix: i64, is_hot: bool) -> Result<()> {
        let resp: SetResponse = self
            .call(
                MessageTag::Set,
                &SetRequest {
                    group: group.to_string(),
                    key: key.to_string(),
                    value: value.to_vec(),
                    expire: expire_unix,
                    is_hot,
                },
            )
            .await?;
        if resp.ok {
            Ok(())
        } else {
            Err(Error::PeerRejected(format!("peer rejected Set for {group}/{key}")))
        }
    }
}
