//! In-memory override cache.
//!
//! Maps asset keys to their current local content so the preview server
//! can inject unsaved edits into render calls without writing them
//! remotely first. The filesystem mirror is the exclusive owner and the
//! only writer; render handlers take read-only snapshots. Each write is a
//! single atomic replace of the whole value under its key — a concurrent
//! reader observes the old content, the new content, or absence, never a
//! torn value.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Key → current local content for every locally modified text asset.
pub struct OverrideCache {
    entries: RwLock<FxHashMap<String, String>>,
}

impl OverrideCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    /// Replace the content under a key. Idempotent: re-applying identical
    /// content is a no-op for readers. Returns whether anything changed.
    pub fn insert(&self, key: &str, content: String) -> bool {
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(existing) if *existing == content => false,
            _ => {
                entries.insert(key.to_string(), content);
                true
            }
        }
    }

    /// Drop a key (file deleted locally).
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Current content for one key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Copy of the full map, passed to the render service as template
    /// replacements.
    pub fn snapshot(&self) -> FxHashMap<String, String> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for OverrideCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let cache = OverrideCache::new();
        assert!(cache.insert("sections/header.liquid", "<div>".into()));
        assert_eq!(cache.get("sections/header.liquid").as_deref(), Some("<div>"));

        assert!(cache.remove("sections/header.liquid"));
        assert_eq!(cache.get("sections/header.liquid"), None);
        assert!(!cache.remove("sections/header.liquid"));
    }

    #[test]
    fn test_reapplying_identical_content_is_noop() {
        let cache = OverrideCache::new();
        assert!(cache.insert("a.liquid", "x".into()));
        assert!(!cache.insert("a.liquid", "x".into()));
        assert!(cache.insert("a.liquid", "y".into()));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let cache = OverrideCache::new();
        cache.insert("a.liquid", "x".into());

        let snapshot = cache.snapshot();
        cache.insert("b.liquid", "y".into());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(cache.len(), 2);
    }
}
