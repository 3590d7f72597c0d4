//! Response cache for single-turn requests
//!
//! Answers are keyed by the exact request text: no trimming, case folding or
//! hashing, so two phrasings of the same question never share an entry.
//! An entry is served while it is younger than the cache TTL (30 days by
//! default). Expired entries read as misses and stay on disk until the same
//! request overwrites them.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;
use crate::storage::{read_json, write_json_atomic};

/// Default lifetime of a cached answer, in days
pub const DEFAULT_TTL_DAYS: i64 = 30;

/// A stored answer and when it was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAnswer {
    pub content: String,
    #[serde(with = "crate::storage::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl CachedAnswer {
    /// Age of the answer at `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
    }
}

/// Request text → answer map with time-based expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCache {
    #[serde(default)]
    entries: BTreeMap<String, CachedAnswer>,
    #[serde(skip, default = "default_ttl")]
    ttl: Duration,
}

fn default_ttl() -> Duration {
    Duration::days(DEFAULT_TTL_DAYS)
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            ttl: default_ttl(),
        }
    }
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different expiry threshold
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Load the cache stored at `path`; missing or empty files give an empty cache
    pub fn load(path: &Path) -> Result<Self> {
        let cache: Self = read_json(path)?.unwrap_or_default();
        debug!(path = %path.display(), entries = cache.entries.len(), "Loaded response cache");
        Ok(cache)
    }

    /// Replace the file at `path` with this cache
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(self, path)?;
        info!(path = %path.display(), entries = self.entries.len(), "Saved response cache");
        Ok(())
    }

    /// Look up a fresh answer for `key` at the current time
    pub fn lookup(&self, key: &str) -> Option<&CachedAnswer> {
        self.lookup_at(key, Utc::now())
    }

    /// Look up a fresh answer for `key` as of `now`.
    ///
    /// Absent and expired entries both come back as `None`.
    pub fn lookup_at(&self, key: &str, now: DateTime<Utc>) -> Option<&CachedAnswer> {
        let entry = self.entries.get(key)?;
        if entry.age_at(now) < self.ttl {
            Some(entry)
        } else {
            debug!(age_days = entry.age_at(now).num_days(), "Cached answer expired");
            None
        }
    }

    /// Insert or overwrite the answer for `key`, stamped now
    pub fn store(&mut self, key: impl Into<String>, content: impl Into<String>) {
        self.store_at(key, content, Utc::now());
    }

    /// Insert or overwrite the answer for `key` with an explicit timestamp
    pub fn store_at(
        &mut self,
        key: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) {
        self.entries.insert(
            key.into(),
            CachedAnswer {
                content: content.into(),
                created_at,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that are past the TTL
    pub fn expired_count(&self) -> usize {
        self.expired_count_at(Utc::now())
    }

    /// Number of entries that are past the TTL at `now`
    pub fn expired_count_at(&self, now: DateTime<Utc>) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.age_at(now) >= self.ttl)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_store_then_lookup() {
        let mut cache = ResponseCache::new();
        cache.store("k", "v");
        assert_eq!(cache.lookup("k").map(|a| a.content.as_str()), Some("v"));
    }

    #[test]
    fn test_lookup_never_stored() {
        let cache = ResponseCache::new();
        assert!(cache.lookup("k").is_none());
    }

    #[test]
    fn test_lookup_after_expiry() {
        let mut cache = ResponseCache::new();
        let stored = Utc::now();
        cache.store_at("k", "v", stored);

        let almost = stored + Duration::days(30) - Duration::seconds(1);
        assert!(cache.lookup_at("k", almost).is_some());
        assert!(cache.lookup_at("k", stored + Duration::days(30)).is_none());
        assert!(cache.lookup_at("k", stored + Duration::days(45)).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_overwrite_refreshes_entry() {
        let mut cache = ResponseCache::new();
        let old = Utc::now() - Duration::days(60);
        cache.store_at("k", "stale", old);
        assert!(cache.lookup("k").is_none());

        cache.store("k", "fresh");
        assert_eq!(cache.lookup("k").unwrap().content, "fresh");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_are_exact() {
        let mut cache = ResponseCache::new();
        cache.store("What is Rust?", "a language");
        assert!(cache.lookup("what is rust?").is_none());
        assert!(cache.lookup("What is Rust? ").is_none());
        assert!(cache.lookup("What is Rust?").is_some());
    }

    #[test]
    fn test_custom_ttl() {
        let mut cache = ResponseCache::new().with_ttl(Duration::hours(1));
        let stored = Utc::now();
        cache.store_at("k", "v", stored);
        assert!(cache.lookup_at("k", stored + Duration::minutes(59)).is_some());
        assert!(cache.lookup_at("k", stored + Duration::minutes(61)).is_none());
        assert_eq!(cache.expired_count_at(stored + Duration::minutes(61)), 1);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = ResponseCache::new();
        cache.store("b", "second");
        cache.store("a", "first");

        cache.save(&path).unwrap();
        let loaded = ResponseCache::load(&path).unwrap();
        assert_eq!(loaded, cache);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.find("\"a\"").unwrap() < raw.find("\"b\"").unwrap());
    }

    #[test]
    fn test_load_empty_and_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        assert!(ResponseCache::load(&path).unwrap().is_empty());

        fs::write(&path, "").unwrap();
        assert!(ResponseCache::load(&path).unwrap().is_empty());

        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            ResponseCache::load(&path).unwrap_err(),
            Error::StorageRead { .. }
        ));
    }
}
