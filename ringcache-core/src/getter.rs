//! The application-supplied "source of truth" loader.
//!
//! `Getter` is the one capability the core demands of its caller: given a
//! key, produce the bytes to cache, or report why it couldn't.

use async_trait::async_trait;

use ringcache_common::Result;

/// Loads a key's value from whatever backs the cache (a database, a file, a
/// remote service). Implementations run on a `Group`'s local node only; a
/// peer owning a key never calls another peer's loader.
#[async_trait]
pub trait Getter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Adapts a plain closure to [`Getter`] so a one-off loader doesn't need a
/// dedicated type.
pub struct GetterFunc<F>(pub F);

#[async_trait]
impl<F> Getter for GetterFunc<F>
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        (self.0)(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringcache_common::Error;

    #[tokio::test]
    async fn getter_func_adapts_a_closure() {
        let getter = GetterFunc(|key: &str| -> Result<Vec<u8>> {
            if key == "Tom" {
                Ok(b"630".to_vec())
            } else {
                Err(Error::NotFound(key.to_string()))
            }
        });
        assert_eq!(getter.get("Tom").await.unwrap(), b"630");
        assert!(matches!(getter.get("Jerry").await.unwrap_err(), Error::NotFound(_)));
    }
}
