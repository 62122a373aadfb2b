//! Persistent response cache
//!
//! A single JSON file holds every entry:
//!
//! ```json
//! { "version": 1, "entries": { "<fingerprint>": { "response": "...", "created_at": 1700000000 } } }
//! ```
//!
//! The file is read once at open time. A missing, unreadable, unparseable or
//! wrong-version file yields an empty cache. Writes rewrite the whole file through a
//! temporary file in the same directory that is renamed into place, so an
//! interrupted write leaves the previous file intact. Expired entries are dropped
//! on the next write.

pub mod fingerprint;

pub use fingerprint::Fingerprint;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::Mutex;

/// On-disk format version
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Responses larger than this are not cached
pub const MAX_CACHED_RESPONSE_BYTES: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to write cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cache writer task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response: String,
    /// Unix seconds
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: CACHE_FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Why `put` did not store a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    SkippedEmpty,
    SkippedTooLarge,
}

#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    /// `None` disables expiry
    ttl: Option<Duration>,
    state: Mutex<CacheFile>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl CacheStore {
    /// Open the cache at `path`; never fails
    ///
    /// `ttl_seconds = 0` disables expiry.
    pub fn open(path: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        let path = path.into();
        let file = load(&path);
        tracing::debug!(
            path = %path.display(),
            entries = file.entries.len(),
            ttl_seconds = ttl_seconds,
            "Opened response cache"
        );
        Self {
            path,
            ttl: (ttl_seconds > 0).then(|| Duration::from_secs(ttl_seconds)),
            state: Mutex::new(file),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_expired(&self, entry: &CacheEntry, now: u64) -> bool {
        self.ttl
            .is_some_and(|ttl| now.saturating_sub(entry.created_at) >= ttl.as_secs())
    }

    /// Entry for `fingerprint`, unless absent or expired
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let state = self.state.lock().await;
        let entry = state.entries.get(fingerprint.as_str())?;
        if self.is_expired(entry, now_secs()) {
            tracing::debug!(fingerprint = %fingerprint, "Cache entry expired");
            return None;
        }
        Some(entry.clone())
    }

    /// Store `response` under `fingerprint` and persist the file
    ///
    /// Empty and oversized responses are not stored.
    pub async fn put(
        &self,
        fingerprint: &Fingerprint,
        response: &str,
    ) -> Result<PutOutcome, CacheError> {
        if response.trim().is_empty() {
            return Ok(PutOutcome::SkippedEmpty);
        }
        if response.len() > MAX_CACHED_RESPONSE_BYTES {
            tracing::debug!(
                fingerprint = %fingerprint,
                size = response.len(),
                "Response too large to cache"
            );
            return Ok(PutOutcome::SkippedTooLarge);
        }

        let mut state = self.state.lock().await;
        let now = now_secs();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !self.is_expired(entry, now));
        let purged = before - state.entries.len();
        if purged > 0 {
            tracing::debug!(purged = purged, "Purged expired cache entries");
        }

        state.entries.insert(
            fingerprint.as_str().to_string(),
            CacheEntry {
                response: response.to_string(),
                created_at: now,
            },
        );

        let bytes = serde_json::to_vec_pretty(&*state)?;
        persist(self.path.clone(), bytes).await?;
        Ok(PutOutcome::Stored)
    }

    /// Remove every entry and persist; returns the number removed
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let mut state = self.state.lock().await;
        let removed = state.entries.len();
        *state = CacheFile::default();
        let bytes = serde_json::to_vec_pretty(&*state)?;
        persist(self.path.clone(), bytes).await?;
        Ok(removed)
    }

    /// Number of entries held, expired ones included
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn load(path: &Path) -> CacheFile {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return CacheFile::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cache file unreadable, starting cold");
            return CacheFile::default();
        }
    };

    match serde_json::from_slice::<CacheFile>(&content) {
        Ok(file) if file.version == CACHE_FORMAT_VERSION => file,
        Ok(file) => {
            tracing::warn!(
                path = %path.display(),
                found = file.version,
                expected = CACHE_FORMAT_VERSION,
                "Cache format version mismatch, starting cold"
            );
            CacheFile::default()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cache file corrupt, starting cold");
            CacheFile::default()
        }
    }
}

/// Write-to-temp-then-rename in the target directory
async fn persist(path: PathBuf, bytes: Vec<u8>) -> Result<(), CacheError> {
    tokio::task::spawn_blocking(move || {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&dir).map_err(io_err)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| CacheError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::from(s)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(dir.path().join("cache.json"), 0);

        assert!(cache.get(&fp("a")).await.is_none());
        assert_eq!(cache.put(&fp("a"), "hello").await.unwrap(), PutOutcome::Stored);
        assert_eq!(cache.get(&fp("a")).await.unwrap().response, "hello");
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        {
            let cache = CacheStore::open(&path, 0);
            cache.put(&fp("a"), "persisted").await.unwrap();
        }
        let reopened = CacheStore::open(&path, 0);
        assert_eq!(reopened.get(&fp("a")).await.unwrap().response, "persisted");
    }

    #[tokio::test]
    async fn test_empty_and_oversized_responses_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = CacheStore::open(&path, 0);

        assert_eq!(cache.put(&fp("a"), "  \n").await.unwrap(), PutOutcome::SkippedEmpty);
        let big = "x".repeat(MAX_CACHED_RESPONSE_BYTES + 1);
        assert_eq!(cache.put(&fp("b"), &big).await.unwrap(), PutOutcome::SkippedTooLarge);
        assert!(cache.is_empty().await);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent_and_purged_on_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let stale = serde_json::json!({
            "version": 1,
            "entries": {
                "old": { "response": "stale", "created_at": 1 },
            }
        });
        std::fs::write(&path, stale.to_string()).unwrap();

        let cache = CacheStore::open(&path, 60);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get(&fp("old")).await.is_none());

        cache.put(&fp("new"), "fresh").await.unwrap();
        assert_eq!(cache.len().await, 1);
        assert!(cache.get(&fp("new")).await.is_some());
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let old = serde_json::json!({
            "version": 1,
            "entries": { "old": { "response": "ancient", "created_at": 1 } }
        });
        std::fs::write(&path, old.to_string()).unwrap();

        let cache = CacheStore::open(&path, 0);
        assert_eq!(cache.get(&fp("old")).await.unwrap().response, "ancient");
    }

    #[tokio::test]
    async fn test_version_mismatch_starts_cold() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let future = serde_json::json!({
            "version": 2,
            "entries": { "a": { "response": "x", "created_at": 1 } }
        });
        std::fs::write(&path, future.to_string()).unwrap();

        let cache = CacheStore::open(&path, 0);
        assert!(cache.get(&fp("a")).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_returns_removed_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = CacheStore::open(&path, 0);
        cache.put(&fp("a"), "1").await.unwrap();
        cache.put(&fp("b"), "2").await.unwrap();

        assert_eq!(cache.clear().await.unwrap(), 2);
        assert!(cache.get(&fp("a")).await.is_none());
        assert!(CacheStore::open(&path, 0).is_empty().await);
    }

    #[tokio::test]
    async fn test_written_file_has_documented_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = CacheStore::open(&path, 0);
        cache.put(&fp("abc"), "value").await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["entries"]["abc"]["response"], "value");
        assert!(raw["entries"]["abc"]["created_at"].as_u64().unwrap() > 0);
    }
}
