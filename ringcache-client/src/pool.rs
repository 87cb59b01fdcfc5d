//! # Connection Pool
//!
//! Purpose: Reuse TCP connections to a peer so a Get/Set doesn't pay a
//! fresh handshake every call.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable connections.
//! 2. **Minimal Locking**: Hold the (sync) mutex only while moving idle
//!    connections in or out; no `.await` happens under it.
//! 3. **Fail Fast**: Exceeding the pool limit returns an error immediately
//!    rather than queuing indefinitely.
//! 4. **RAII Return**: A checked-out connection rejoins the pool on drop,
//!    or is dropped entirely if it's been marked invalid.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use ringcache_common::{Error, Result};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Peer address, e.g. `"10.0.0.2:8888"`.
    pub addr: String,
    /// Maximum idle connections kept ready.
    pub max_idle: usize,
    /// Maximum total connections (idle + checked out).
    pub max_total: usize,
    /// Deadline for establishing a fresh TCP connection.
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            addr: String::new(),
            max_idle: 4,
            max_total: 16,
            connect_timeout: Duration::from_secs(2),
        }
    }
}

struct PoolState {
    idle: VecDeque<TcpStream>,
    total: usize,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

/// Cheaply cloneable handle to a peer's connection pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        ConnectionPool {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    idle: VecDeque::with_capacity(config.max_idle),
                    total: 0,
                }),
                config,
            }),
        }
    }

    /// Checks out a connection, reusing an idle one or dialing a fresh one
    /// if the pool has headroom.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        if let Some(stream) = self.pop_idle() {
            return Ok(PooledConnection::new(self.inner.clone(), stream));
        }

        if !self.try_reserve() {
            return Err(Error::PeerUnreachable(format!(
                "connection pool for {} is exhausted",
                self.inner.config.addr
            )));
        }

        match self.dial().await {
            Ok(stream) => Ok(PooledConnection::new(self.inner.clone(), stream)),
            Err(err) => {
                self.release_slot();
                Err(err)
            }
        }
    }

    async fn dial(&self) -> Result<TcpStream> {
        let connect = TcpStream::connect(&self.inner.config.addr);
        match timeout(self.inner.config.connect_timeout, connect).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true).ok();
                Ok(stream)
            }
            Ok(Err(err)) => Err(Error::PeerUnreachable(err.to_string())),
            Err(_) => Err(Error::PeerUnreachable(format!(
                "connect to {} timed out",
                self.inner.config.addr
            ))),
        }
    }

    fn pop_idle(&self) -> Option<TcpStream> {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.idle.pop_front()
    }

    fn try_reserve(&self) -> bool {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.total >= self.inner.config.max_total {
            return false;
        }
        state.total += 1;
        true
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.total = state.total.saturating_sub(1);
    }

    fn return_connection(&self, stream: TcpStream) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.idle.len() < self.inner.config.max_idle {
            state.idle.push_back(stream);
        } else {
            state.total = state.total.saturating_sub(1);
        }
    }
}

/// A checked-out connection. Rejoins the pool on drop unless
/// [`PooledConnection::invalidate`] was called (an IO or protocol error
/// makes the stream unsafe to reuse).
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    stream: Option<TcpStream>,
    valid: bool,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, stream: TcpStream) -> Self {
        PooledConnection {
            pool,
            stream: Some(stream),
            valid: true,
        }
    }

    pub fn stream(&mut self) -> &mut TcpStream {
        self.stream.as_mut().expect("connection exists")
    }

    /// Marks this connection as unsafe to reuse; it is dropped instead of
    /// returned to the pool.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        let pool = ConnectionPool {
            inner: self.pool.clone(),
        };
        if self.valid {
            pool.return_connection(stream);
        } else {
            pool.release_slot();
        }
    }
}
