use thiserror::Error;

use crate::cache::AnyCacheError;

#[derive(Debug, Error)]
pub enum ChatterError {
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] AnyCacheError),

    #[error("Cached snapshot is unreadable: {0}")]
    Snapshot(String),

    #[error("Sign-in failed: {0}")]
    SignIn(String),
}
