use anyhow::{anyhow, Result};
use dotstorage_index::JsonCache;
use std::path::PathBuf;

/// Read a required environment variable, failing with its name when unset or empty
pub fn must_get_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(anyhow!("missing environment variable: {}", key)),
    }
}

/// Connection settings for the IPFS Cluster API
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub api_url: String,
    pub basic_auth_token: String,
}

impl ClusterConfig {
    /// Load from the environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            api_url: must_get_env("CLUSTER_API_URL")?,
            basic_auth_token: must_get_env("CLUSTER_BASIC_AUTH_TOKEN")?,
        })
    }
}

/// Where fetched adverts are cached
pub fn advert_cache_dir() -> Result<PathBuf> {
    JsonCache::default_dir().ok_or_else(|| anyhow!("could not determine home directory"))
}
