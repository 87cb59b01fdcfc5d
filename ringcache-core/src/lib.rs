//! Core algorithms of the cache: the byte-budgeted LRU engine, the
//! two-tier cache, the consistent-hash ring, the request coalescer, the
//! Group coordinator, and the peer/discovery seams a transport and a
//! service registry plug into.

pub mod coalesce;
pub mod discovery;
pub mod getter;
pub mod group;
pub mod hashring;
pub mod lru;
pub mod peer;
pub mod registry;
pub mod tiered;

pub use coalesce::Coalescer;
pub use discovery::{Discovery, StaticDiscovery};
pub use getter::{Getter, GetterFunc};
pub use group::{byte_view_from_wire, Group, DEFAULT_EXPIRE};
pub use hashring::{fnv1_64, Ring};
pub use lru::Lru;
pub use peer::{PeerFactory, PeerGetter, PeerPicker, PeerRegistry};
pub use registry::GroupRegistry;
pub use tiered::{Tier, TieredCache};
