use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, PoisonError, RwLock};

use crate::message::Message;

/// Key under which the last remote snapshot is persisted.
pub const CACHE_KEY: &str = "cached_chats";

/// A durable key-value store for serialized snapshots.
///
/// Only single-key reads and writes; no transactions are assumed. All
/// methods take `&self` to support stores with internal locking.
pub trait Cache {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Retrieves the bytes stored under `key`, or None if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Overwrites the bytes stored under `key`.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), Self::Error>;
}

impl<C: Cache> Cache for &C {
    type Error = C::Error;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        (*self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        (*self).set(key, value)
    }
}

impl<C: Cache> Cache for Arc<C> {
    type Error = C::Error;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        (**self).set(key, value)
    }
}

/// An in-memory cache backed by a HashMap.
///
/// Useful for testing and as a reference implementation.
#[derive(Debug, Default)]
pub struct MemoryCache {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    type Error = Infallible;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError<E> {
    #[error("cache error: {0}")]
    Cache(E),
    #[error("invalid snapshot: {0}")]
    Format(#[from] serde_json::Error),
}

/// Serializes a message list into the cache layout.
pub fn encode_snapshot(messages: &[Message]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(messages)
}

/// Deserializes the cache layout, preserving the stored order.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<Message>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Reads and decodes the snapshot at `key`, if one was stored.
pub fn read_snapshot<C: Cache>(
    cache: &C,
    key: &str,
) -> Result<Option<Vec<Message>>, SnapshotError<C::Error>> {
    match cache.get(key).map_err(SnapshotError::Cache)? {
        Some(bytes) => Ok(Some(decode_snapshot(&bytes)?)),
        None => Ok(None),
    }
}

/// Encodes `messages` and overwrites the snapshot at `key`.
pub fn write_snapshot<C: Cache>(
    cache: &C,
    key: &str,
    messages: &[Message],
) -> Result<(), SnapshotError<C::Error>> {
    let bytes = encode_snapshot(messages)?;
    cache.set(key, &bytes).map_err(SnapshotError::Cache)
}
