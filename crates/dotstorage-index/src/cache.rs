/*!
# JSON Document Cache

Advertisements and entry chunks are immutable once published, so they are kept
on disk keyed by the last segment of the URL they were fetched from.
*/

use crate::IndexResult;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

/// Directory-backed cache of fetched JSON documents
#[derive(Debug, Clone)]
pub struct JsonCache {
    dir: PathBuf,
}

impl JsonCache {
    /// Use `dir` as the cache, creating it if needed
    pub async fn open(dir: impl Into<PathBuf>) -> IndexResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// `~/.dotstorage/cache/adverts`, if a home directory is known
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".dotstorage").join("cache").join("adverts"))
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, url: &Url) -> Option<PathBuf> {
        url.path_segments()
            .and_then(|segments| segments.last())
            .filter(|key| !key.is_empty())
            .map(|key| self.dir.join(key))
    }

    /// Cached body for `url`, if present
    pub async fn get(&self, url: &Url) -> Option<String> {
        let path = self.path_for(url)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => {
                debug!("Cache hit for {}", url);
                Some(body)
            }
            Err(_) => None,
        }
    }

    /// Store the raw body fetched from `url`. Failures are logged, not raised.
    pub async fn put(&self, url: &Url, body: &str) {
        let path = match self.path_for(url) {
            Some(path) => path,
            None => return,
        };
        if let Err(e) = tokio::fs::write(&path, body).await {
            warn!("Failed to cache {} at {}: {}", url, path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_by_last_segment() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonCache::open(dir.path().join("adverts")).await.unwrap();

        let url = Url::parse("https://example.com/some/path/baguqeera").unwrap();
        assert!(cache.get(&url).await.is_none());

        cache.put(&url, r#"{"ok":true}"#).await;
        assert_eq!(cache.get(&url).await.as_deref(), Some(r#"{"ok":true}"#));

        // keyed by the last segment only
        let other_host = Url::parse("https://other.example/baguqeera").unwrap();
        assert!(cache.get(&other_host).await.is_some());
        assert!(cache.dir().join("baguqeera").exists());
    }

    #[tokio::test]
    async fn test_url_without_segment_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonCache::open(dir.path()).await.unwrap();

        let url = Url::parse("https://example.com/").unwrap();
        cache.put(&url, "{}").await;
        assert!(cache.get(&url).await.is_none());
    }
}
