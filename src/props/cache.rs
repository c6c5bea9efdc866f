use std::collections::HashMap;

use crate::props::PropertyMap;
use crate::util::is_same_or_below;

/// Per-request property cache: normalized path -> full property set.
///
/// An entry reflects the property set for its path as of the last read
/// through the owning backend. Writes must invalidate it; the cache is
/// never authoritative on its own.
#[derive(Debug, Default)]
pub struct PropertyCache {
    entries: HashMap<String, PropertyMap>,
}

impl PropertyCache {
    pub fn new() -> PropertyCache {
        PropertyCache::default()
    }

    pub fn get(&self, path: &str) -> Option<&PropertyMap> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, props: PropertyMap) {
        self.entries.insert(path.into(), props);
    }

    pub fn invalidate(&mut self, path: &str) {
        self.entries.remove(path);
    }

    /// Drop the entry for `path` and every entry below it.
    pub fn invalidate_tree(&mut self, path: &str) {
        self.entries.retain(|p, _| !is_same_or_below(p, path));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(name: &str, value: &str) -> PropertyMap {
        let mut m = PropertyMap::new();
        m.insert(name.to_string(), value.to_string());
        m
    }

    #[test]
    fn test_invalidate() {
        let mut cache = PropertyCache::new();
        cache.insert("/a", props("x", "1"));
        cache.insert("/b", props("y", "2"));
        cache.invalidate("/a");
        assert!(cache.get("/a").is_none());
        assert_eq!(cache.get("/b").unwrap()["y"], "2");
    }

    #[test]
    fn test_invalidate_tree() {
        let mut cache = PropertyCache::new();
        cache.insert("/dir", PropertyMap::new());
        cache.insert("/dir/file", PropertyMap::new());
        cache.insert("/dir2", PropertyMap::new());
        cache.invalidate_tree("/dir");
        assert_eq!(cache.len(), 1);
        assert!(cache.get("/dir2").is_some());

        cache.invalidate_tree("/");
        assert!(cache.is_empty());
    }
}
