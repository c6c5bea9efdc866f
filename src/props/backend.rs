use std::sync::Arc;

use crate::errors::PropResult;
use crate::props::{Node, PropertyCache, PropertyChange, PropertyMap, PropertyStore};
use crate::util::normalize_path;

/// The property store as seen by one request.
///
/// Binds a durable [`PropertyStore`] to the authenticated user of the
/// request and caches what it reads. Create one per request and drop it
/// afterwards; the cache is never shared between instances.
pub struct PropertyBackend {
    store: Arc<dyn PropertyStore>,
    user: String,
    cache: PropertyCache,
}

impl PropertyBackend {
    pub fn new(store: Arc<dyn PropertyStore>, user: impl Into<String>) -> PropertyBackend {
        PropertyBackend {
            store,
            user: user.into(),
            cache: PropertyCache::new(),
        }
    }

    /// Properties of `node` for a request of `requested`.
    ///
    /// Returns nothing for an unrecognized node or an empty request.
    /// Otherwise the full property set of the path is returned, and the
    /// caller picks the names it needs.
    pub fn fetch(&mut self, node: Option<&Node>, requested: &[String]) -> PropResult<PropertyMap> {
        let node = match node {
            Some(node) => node,
            None => return Ok(PropertyMap::new()),
        };
        if requested.is_empty() {
            return Ok(PropertyMap::new());
        }
        self.load(node.path())
    }

    /// All properties of `node`.
    pub fn fetch_all(&mut self, node: Option<&Node>) -> PropResult<PropertyMap> {
        match node {
            Some(node) => self.load(node.path()),
            None => Ok(PropertyMap::new()),
        }
    }

    // Cache entries always hold the full set, a filtered read would hide
    // the other names from later lookups.
    fn load(&mut self, path: &str) -> PropResult<PropertyMap> {
        if let Some(props) = self.cache.get(path) {
            debug!("property cache hit for {}", path);
            return Ok(props.clone());
        }
        debug!("property cache miss for {} ({} cached)", path, self.cache.len());
        let props = self.store.select(&self.user, path, None)?;
        self.cache.insert(path, props.clone());
        Ok(props)
    }

    /// Apply a set of property changes to `node` in one transaction.
    ///
    /// A no-op for an unrecognized node. The cache entry for the path is
    /// dropped afterwards, whether the store call succeeded or not.
    pub fn patch(&mut self, node: Option<&Node>, changes: &[PropertyChange]) -> PropResult<()> {
        let node = match node {
            Some(node) => node,
            None => return Ok(()),
        };
        let res = self.store.apply(&self.user, node.path(), changes);
        self.cache.invalidate(node.path());
        res
    }

    /// Called after a node was deleted. No existence check: the node is
    /// already gone when this runs.
    pub fn on_delete(&mut self, path: &str) -> PropResult<()> {
        let path = normalize_path(path);
        let res = self.store.delete_path(&self.user, &path);
        self.cache.invalidate(&path);
        res.map(|_| ())
    }

    /// Called after a successful move. Properties of descendants move along.
    ///
    /// If either end is not a recognized node, nothing is migrated.
    pub fn on_move(&mut self, source: Option<&Node>, destination: Option<&Node>) -> PropResult<()> {
        let (source, destination) = match (source, destination) {
            (Some(s), Some(d)) => (s, d),
            _ => {
                debug!("on_move: source or destination not a file/directory, skipped");
                return Ok(());
            }
        };
        debug!(
            "on_move: {:?} {} -> {}",
            source.kind(),
            source.path(),
            destination.path()
        );
        let res = self
            .store
            .move_path(&self.user, source.path(), destination.path());
        self.cache.invalidate_tree(source.path());
        self.cache.invalidate_tree(destination.path());
        res.map(|_| ())
    }
}
