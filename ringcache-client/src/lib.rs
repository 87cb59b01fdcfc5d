//! TCP peer transport: a pooled, deadline-bounded implementation of
//! `ringcache_core::PeerGetter` speaking the wire protocol defined in
//! `ringcache_common::wire`.

pub mod client;
pub mod pool;

pub use client::{PeerClient, PeerClientConfig, CALL_DEADLINE};
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
