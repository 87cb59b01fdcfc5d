//! Error taxonomy shared by every ringcache crate.
//!
//! Mirrors the five categories the core distinguishes: a caller mistake
//! (`InvalidArgument`), a confirmed absence (`NotFound`), a peer that could
//! not be reached in time (`PeerUnreachable`), a peer that rejected a write
//! (`PeerRejected`), and everything else the application loader raised
//! (`Internal`). The LRU engine itself never produces an `Error` — it has no
//! operation that can fail.

use std::fmt;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core, the peer transport, and the front-end.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The caller passed an empty key.
    #[error("key must not be empty")]
    InvalidArgument,

    /// The loader (or a peer) reported that the key does not exist.
    #[error("key not found: {0}")]
    NotFound(String),

    /// A peer RPC did not complete before its deadline, or the connection
    /// could not be established at all. Callers that see this should call
    /// `PeerRegistry::remove_peer_by_key` and retry through the loader.
    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    /// A peer's `Set` responded with `ok = false`.
    #[error("peer rejected write: {0}")]
    PeerRejected(String),

    /// The application loader failed for a reason other than "not found".
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors that should trigger `RemovePeerByKey` + retry in an
    /// outer layer (the front-end).
    pub fn is_peer_unreachable(&self) -> bool {
        matches!(self, Error::PeerUnreachable(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::PeerUnreachable(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::PeerUnreachable("deadline exceeded".to_string())
    }
}

/// Wraps a raw bincode (de)serialization failure as a wire-level internal error.
pub struct WireError(pub Box<bincode::ErrorKind>);

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wire codec error: {}", self.0)
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Internal(WireError(err).to_string())
    }
}
