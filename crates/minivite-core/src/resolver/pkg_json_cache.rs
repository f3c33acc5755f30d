//! Package manifest parse cache.
//!
//! Parsed `package.json` files are cached with mtime/size stamps so an edited
//! manifest is picked up on the next lookup without explicit invalidation.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// File stamp for cache invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PkgJsonStamp {
    /// Modification time in milliseconds since epoch.
    pub mtime_ms: Option<u64>,
    /// File size in bytes.
    pub size: Option<u64>,
}

impl PkgJsonStamp {
    /// Create stamp from a path by reading its metadata.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_path(path: &Path) -> Self {
        if let Ok(meta) = path.metadata() {
            let mtime_ms = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64);
            Self {
                mtime_ms,
                size: Some(meta.len()),
            }
        } else {
            Self::default()
        }
    }

    /// Check if the stamp matches the current file state.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.metadata().is_ok() && Self::from_path(path) == *self
    }
}

/// Cached manifest entry.
#[derive(Debug, Clone)]
pub struct CachedPkgJson {
    /// The parsed manifest.
    pub value: Value,
    /// File stamp for invalidation.
    pub stamp: PkgJsonStamp,
}

/// Trait for caching parsed manifests.
///
/// Implementations should be thread-safe (Send + Sync).
pub trait PkgJsonCache: Send + Sync + std::fmt::Debug {
    /// Look up a cached manifest by path.
    ///
    /// Returns None if not cached or if the stamp is stale.
    fn get(&self, path: &Path) -> Option<Value>;

    /// Store a parsed manifest in the cache.
    fn set(&self, path: &Path, value: Value);
}

/// No-op cache implementation (always misses, never stores).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPkgJsonCache;

impl PkgJsonCache for NoPkgJsonCache {
    fn get(&self, _path: &Path) -> Option<Value> {
        None
    }

    fn set(&self, _path: &Path, _value: Value) {}
}

/// In-memory cache validated against file stamps.
#[derive(Debug, Default)]
pub struct StampedPkgJsonCache {
    entries: Mutex<HashMap<PathBuf, CachedPkgJson>>,
}

impl StampedPkgJsonCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached manifests, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PkgJsonCache for StampedPkgJsonCache {
    fn get(&self, path: &Path) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(path)?;
        if entry.stamp.matches(path) {
            Some(entry.value.clone())
        } else {
            entries.remove(path);
            None
        }
    }

    fn set(&self, path: &Path, value: Value) {
        let stamp = PkgJsonStamp::from_path(path);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), CachedPkgJson { value, stamp });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_stamp_from_path() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("package.json");
        fs::write(&file, r#"{"name": "test"}"#).unwrap();

        let stamp = PkgJsonStamp::from_path(&file);
        assert!(stamp.mtime_ms.is_some());
        assert!(stamp.size.is_some());
        assert!(stamp.matches(&file));
    }

    #[test]
    fn test_stamp_nonexistent_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("nonexistent.json");

        let stamp = PkgJsonStamp::from_path(&file);
        assert!(stamp.mtime_ms.is_none());
        assert!(!stamp.matches(&file));
    }

    #[test]
    fn test_no_cache_always_misses() {
        let cache = NoPkgJsonCache;
        let path = Path::new("/fake/package.json");
        cache.set(path, serde_json::json!({"name": "test"}));
        assert!(cache.get(path).is_none());
    }

    #[test]
    fn test_stamped_cache_hit() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("package.json");
        fs::write(&file, r#"{"name": "test"}"#).unwrap();

        let cache = StampedPkgJsonCache::new();
        cache.set(&file, serde_json::json!({"name": "test"}));
        assert_eq!(cache.get(&file).unwrap()["name"], "test");
    }

    #[test]
    fn test_stamped_cache_drops_stale_entry() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("package.json");
        fs::write(&file, r#"{"name": "test"}"#).unwrap();

        let cache = StampedPkgJsonCache::new();
        cache.set(&file, serde_json::json!({"name": "test"}));

        // Size changes, so the stamp no longer matches.
        fs::write(&file, r#"{"name": "modified-package"}"#).unwrap();
        assert!(cache.get(&file).is_none());
        assert!(cache.is_empty());
    }
}
