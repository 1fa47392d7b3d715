use std::path::PathBuf;

use chatter_core::{Location, ThemeColor};
use serde::Deserialize;

use crate::cache::{default_cache_path, CacheType};
use crate::error::ChatterError;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    pub name: Option<String>,
    pub theme: Option<ThemeColor>,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub r#type: CacheType,
    pub path: Option<PathBuf>,
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chatter").join("config.toml"))
}

pub fn parse_config(content: &str) -> Result<Config, ChatterError> {
    Ok(toml::from_str(content)?)
}

pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };

    let Ok(content) = std::fs::read_to_string(path) else {
        return Config::default();
    };

    parse_config(&content).unwrap_or_default()
}

/// Display name: flag, then `CHATTER_NAME`, then config file.
pub fn resolve_name(config: &Config, cli_name: Option<String>) -> String {
    if let Some(name) = cli_name {
        return name;
    }

    if let Ok(name) = std::env::var("CHATTER_NAME") {
        if !name.is_empty() {
            return name;
        }
    }

    config.name.clone().unwrap_or_default()
}

pub fn resolve_theme(config: &Config, cli_theme: Option<ThemeColor>) -> ThemeColor {
    cli_theme.or(config.theme).unwrap_or_default()
}

pub fn resolve_cache_config(
    config: &Config,
    cli_type: Option<CacheType>,
    cli_path: Option<PathBuf>,
) -> (CacheType, PathBuf) {
    let cache_type = cli_type.unwrap_or(config.cache.r#type);
    let cache_path = cli_path
        .or_else(|| config.cache.path.clone())
        .unwrap_or_else(default_cache_path);

    (cache_type, cache_path)
}

/// Parses `LAT,LON` in decimal degrees.
pub fn parse_location(s: &str) -> Result<Location, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {:?}", s))?;
    let latitude: f64 = lat.trim().parse().map_err(|e| format!("latitude: {}", e))?;
    let longitude: f64 = lon.trim().parse().map_err(|e| format!("longitude: {}", e))?;

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(format!("coordinates out of range: {}", s));
    }
    Ok(Location::new(latitude, longitude))
}
