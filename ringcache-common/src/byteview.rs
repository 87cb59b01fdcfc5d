//! Immutable cached byte values.

use std::sync::Arc;
use std::time::Instant;

/// An immutable view of cached bytes plus the wall-clock instant at which
/// they expire.
///
/// The bytes are reference-counted internally so a [`ByteView`] can be
/// cheaply cloned to every caller joined on a coalesced load, but every
/// external entry/exit point copies: construction takes ownership of a
/// fresh buffer and [`ByteView::byte_slice`] always hands back a distinct
/// allocation, so no external holder can mutate cached state through an
/// aliased buffer.
#[derive(Clone, Debug)]
pub struct ByteView {
    bytes: Arc<[u8]>,
    expire: Instant,
}

impl ByteView {
    /// Builds a view over `bytes`, expiring at `expire`.
    pub fn new(bytes: Vec<u8>, expire: Instant) -> Self {
        ByteView {
            bytes: Arc::from(bytes),
            expire,
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the view holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The wall-clock instant this view expires at.
    pub fn expire(&self) -> Instant {
        self.expire
    }

    /// Returns a fresh copy of the underlying bytes.
    ///
    /// Always allocates, even though the internal representation is
    /// reference-counted, so callers can never observe or mutate the
    /// cache's own buffer.
    pub fn byte_slice(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Borrow the bytes without copying, for callers that only read.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lossy UTF-8 rendering, for display/debugging convenience.
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// Capability a value must have to live in the LRU engine: the engine only
/// needs to know how many bytes an entry costs against the byte budget.
pub trait CacheValue: Clone + Send + Sync + 'static {
    /// Byte cost charged against the LRU's byte budget (the value's own
    /// payload; the key's bytes are charged separately by the LRU).
    fn cache_len(&self) -> usize;
}

impl CacheValue for ByteView {
    fn cache_len(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn byte_slice_is_a_distinct_allocation() {
        let original = vec![1u8, 2, 3];
        let view = ByteView::new(original.clone(), Instant::now() + Duration::from_secs(1));
        let mut copy = view.byte_slice();
        assert_eq!(copy, original);
        copy.push(4);
        assert_eq!(view.byte_slice(), original);
    }

    #[test]
    fn len_matches_payload() {
        let view = ByteView::new(vec![0u8; 7], Instant::now());
        assert_eq!(view.len(), 7);
        assert_eq!(view.cache_len(), 7);
    }
}
