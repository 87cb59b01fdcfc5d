//! Types and wire framing shared by every ringcache crate: the error
//! taxonomy, the immutable cached byte value, and the peer RPC contract.

pub mod byteview;
pub mod error;
pub mod time;
pub mod wire;

pub use byteview::{ByteView, CacheValue};
pub use error::{Error, Result};
pub use time::{instant_to_unix_secs, unix_secs_to_instant};
pub use wire::{
    decode, read_frame, write_frame, ErrorKind, ErrorResponse, GetRequest, GetResponse,
    MessageTag, SetRequest, SetResponse,
};
