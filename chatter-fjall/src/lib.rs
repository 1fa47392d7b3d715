//! Fjall-backed snapshot cache for Chatter.

use std::path::Path;

use chatter_core::Cache;
use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use thiserror::Error;

pub const DEFAULT_KEYSPACE: &str = "cache";

#[derive(Debug, Error)]
#[error("Fjall error: {0}")]
pub struct FjallError(#[from] fjall::Error);

/// A persistent cache backed by Fjall.
pub struct FjallCache {
    keyspace: Keyspace,
    _database: Database, // Keep keyspace alive
}

impl FjallCache {
    /// Opens a Fjall cache at the given path using the default keyspace.
    ///
    /// Creates the database if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FjallError> {
        Self::open_keyspace(path, DEFAULT_KEYSPACE)
    }

    /// Opens a Fjall cache at the given path with a specific keyspace name.
    pub fn open_keyspace(path: impl AsRef<Path>, keyspace: &str) -> Result<Self, FjallError> {
        let database = Database::builder(path).open()?;
        let keyspace = database.keyspace(keyspace, || KeyspaceCreateOptions::default())?;
        Ok(Self {
            keyspace,
            _database: database,
        })
    }
}

impl Cache for FjallCache {
    type Error = FjallError;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.keyspace.get(key)?.map(|v| v.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        self.keyspace.insert(key, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatter_core::{read_snapshot, write_snapshot, Author, Content, Message, MessageId, CACHE_KEY};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn temp_cache() -> (FjallCache, TempDir) {
        let dir = TempDir::new().unwrap();
        let cache = FjallCache::open(dir.path()).unwrap();
        (cache, dir)
    }

    fn sample() -> Vec<Message> {
        vec![
            Message::new(
                MessageId::new("m2"),
                Author::new("u1", "Ada"),
                Content::text("second"),
                Utc.timestamp_millis_opt(2_000).unwrap(),
            ),
            Message::new(
                MessageId::new("m1"),
                Author::new("u2", "Grace"),
                Content::text("first"),
                Utc.timestamp_millis_opt(1_000).unwrap(),
            ),
        ]
    }

    #[test]
    fn set_get() {
        let (cache, _dir) = temp_cache();
        cache.set(CACHE_KEY, b"[]").unwrap();

        assert_eq!(cache.get(CACHE_KEY).unwrap(), Some(b"[]".to_vec()));
    }

    #[test]
    fn get_missing() {
        let (cache, _dir) = temp_cache();

        assert_eq!(cache.get(CACHE_KEY).unwrap(), None);
    }

    #[test]
    fn overwrite() {
        let (cache, _dir) = temp_cache();
        cache.set(CACHE_KEY, b"first").unwrap();
        cache.set(CACHE_KEY, b"second").unwrap();

        assert_eq!(cache.get(CACHE_KEY).unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn snapshot_survives_restart() {
        let dir = TempDir::new().unwrap();
        let messages = sample();

        {
            let cache = FjallCache::open(dir.path()).unwrap();
            write_snapshot(&cache, CACHE_KEY, &messages).unwrap();
        }

        {
            let cache = FjallCache::open(dir.path()).unwrap();
            let restored = read_snapshot(&cache, CACHE_KEY).unwrap().unwrap();
            assert_eq!(restored, messages);
        }
    }
}
