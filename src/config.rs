//! Environment configuration. Call `dotenvy::dotenv()` first to pick up a local `.env`.

use std::str::FromStr;
use std::time::Duration;
use crate::{InventoryError, Result};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub nats_url: String,
    /// Caching is disabled when unset.
    pub redis_url: Option<String>,
    pub cache_ttl: Duration,
    pub handler_timeout: Duration,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| InventoryError::Config("DATABASE_URL is required".into()))?;
        Ok(Self {
            database_url,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: lookup("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string()),
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            cache_ttl: Duration::from_secs(parse_or(&lookup, "CACHE_TTL_SECS", 3600)?),
            handler_timeout: Duration::from_secs(parse_or(&lookup, "HANDLER_TIMEOUT_SECS", 30)?),
            port: parse_or(&lookup, "PORT", 8084)?,
        })
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| InventoryError::Config(format!("{key} has invalid value {raw:?}"))),
    }
}
