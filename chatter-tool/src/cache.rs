use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatter_core::{Cache, MemoryMessageStore};
use chatter_fjall::FjallCache;
use chatter_rocks::RocksCache;
use serde::Deserialize;
use thiserror::Error;

use crate::devices::DirMediaStore;

#[derive(Debug, Error)]
pub enum AnyCacheError {
    #[error("fjall error: {0}")]
    Fjall(#[from] chatter_fjall::FjallError),
    #[error("rocks error: {0}")]
    Rocks(#[from] chatter_rocks::RocksError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    #[default]
    Fjall,
    Rocks,
}

impl std::str::FromStr for CacheType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fjall" => Ok(CacheType::Fjall),
            "rocks" | "rocksdb" => Ok(CacheType::Rocks),
            _ => Err(format!("unknown cache type: {}", s)),
        }
    }
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::Fjall => write!(f, "fjall"),
            CacheType::Rocks => write!(f, "rocks"),
        }
    }
}

pub enum AnyCache {
    Fjall(FjallCache),
    Rocks(RocksCache),
}

impl AnyCache {
    pub fn open(cache_type: CacheType, path: impl AsRef<Path>) -> Result<Self, AnyCacheError> {
        match cache_type {
            CacheType::Fjall => Ok(Self::Fjall(FjallCache::open(path)?)),
            CacheType::Rocks => Ok(Self::Rocks(RocksCache::open(path)?)),
        }
    }
}

impl Cache for AnyCache {
    type Error = AnyCacheError;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error> {
        match self {
            AnyCache::Fjall(c) => c.get(key).map_err(Into::into),
            AnyCache::Rocks(c) => c.get(key).map_err(Into::into),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), Self::Error> {
        match self {
            AnyCache::Fjall(c) => c.set(key, value).map_err(Into::into),
            AnyCache::Rocks(c) => c.set(key, value).map_err(Into::into),
        }
    }
}

/// Collaborators shared by every command.
pub struct AppContext {
    pub cache: AnyCache,
    pub remote: Arc<MemoryMessageStore>,
    pub media: Arc<DirMediaStore>,
}

impl AppContext {
    pub fn open(cache_type: CacheType, cache_path: PathBuf, data_dir: &Path) -> Result<Self, AnyCacheError> {
        let cache = AnyCache::open(cache_type, &cache_path)?;
        let remote = Arc::new(MemoryMessageStore::new());
        let media = Arc::new(DirMediaStore::new(data_dir.join("media")));

        Ok(Self {
            cache,
            remote,
            media,
        })
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatter")
}

pub fn default_cache_path() -> PathBuf {
    default_data_dir().join("cache")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cache_type_parsing() {
        assert_eq!("fjall".parse::<CacheType>().unwrap(), CacheType::Fjall);
        assert_eq!("RocksDB".parse::<CacheType>().unwrap(), CacheType::Rocks);
        assert!("sqlite".parse::<CacheType>().is_err());
        assert_eq!(CacheType::Rocks.to_string(), "rocks");
    }

    #[test]
    fn any_cache_dispatches_to_backend() {
        for cache_type in [CacheType::Fjall, CacheType::Rocks] {
            let dir = TempDir::new().unwrap();
            let cache = AnyCache::open(cache_type, dir.path()).unwrap();

            cache.set("k", b"v").unwrap();
            assert_eq!(cache.get("k").unwrap(), Some(b"v".to_vec()), "{cache_type}");
        }
    }
}
