//! Dead property support for any filesystem.
//!
//! `PropFs` wraps a [`DavFileSystem`] and serves the property calls of the
//! webdav handler from a [`PropertyBackend`]. Everything else is passed
//! through to the wrapped filesystem, and deletes and renames that succeed
//! there are propagated to the property store.
//!
//! A `PropFs` belongs to one request: it carries the backend of the
//! authenticated user, including its cache. Build a new one per request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dav_server::davpath::DavPath;
use dav_server::fs::*;
use futures_util::FutureExt;
use http::StatusCode;
use parking_lot::Mutex;

use crate::errors::PropResult;
use crate::props::protected::is_protected;
use crate::props::{Node, NodeKind, PropertyBackend, PropertyChange};
use crate::util::{clark_name, normalize_path, parse_clark};

/// Filesystem wrapper that stores dead properties.
#[derive(Clone)]
pub struct PropFs {
    inner: Arc<dyn DavFileSystem>,
    backend: Arc<Mutex<PropertyBackend>>,
}

impl PropFs {
    pub fn new(inner: Arc<dyn DavFileSystem>, backend: PropertyBackend) -> Box<PropFs> {
        Box::new(PropFs {
            inner,
            backend: Arc::new(Mutex::new(backend)),
        })
    }

    // Files and directories are the only nodes that carry properties.
    async fn resolve(&self, path: &DavPath) -> Option<Node> {
        match self.inner.metadata(path).await {
            Ok(meta) if meta.is_dir() => Some(Node::new(&path_key(path), NodeKind::Directory)),
            Ok(meta) if meta.is_file() => Some(Node::new(&path_key(path), NodeKind::File)),
            _ => None,
        }
    }

    // The store does blocking round-trips, keep them off the async workers.
    async fn with_backend<T, F>(&self, f: F) -> PropResult<T>
    where
        F: FnOnce(&mut PropertyBackend) -> PropResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || f(&mut *backend.lock())).await?
    }
}

fn path_key(path: &DavPath) -> String {
    normalize_path(&String::from_utf8_lossy(path.as_bytes()))
}

fn prop_name(prop: &DavProp) -> String {
    clark_name(prop.namespace.as_deref(), &prop.name)
}

// What we answer with in a PROPPATCH response: the name, no content.
fn bare_prop(prop: DavProp) -> DavProp {
    DavProp { xml: None, ..prop }
}

// A "set" normally carries the element. If not, store it empty.
fn prop_xml(prop: &DavProp) -> String {
    match &prop.xml {
        Some(xml) => String::from_utf8_lossy(xml).into_owned(),
        None => match &prop.namespace {
            Some(ns) => format!("<{} xmlns=\"{}\"/>", prop.name, ns),
            None => format!("<{}/>", prop.name),
        },
    }
}

impl DavFileSystem for PropFs {
    fn open<'a>(
        &'a self,
        path: &'a DavPath,
        options: OpenOptions,
    ) -> FsFuture<'a, Box<dyn DavFile>> {
        self.inner.open(path, options)
    }

    fn read_dir<'a>(
        &'a self,
        path: &'a DavPath,
        meta: ReadDirMeta,
    ) -> FsFuture<'a, FsStream<Box<dyn DavDirEntry>>> {
        self.inner.read_dir(path, meta)
    }

    fn metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        self.inner.metadata(path)
    }

    fn symlink_metadata<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, Box<dyn DavMetaData>> {
        self.inner.symlink_metadata(path)
    }

    fn create_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        self.inner.create_dir(path)
    }

    fn remove_dir<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            trace!("FS: remove_dir {path:?}");
            self.inner.remove_dir(path).await?;
            let key = path_key(path);
            self.with_backend(move |b| b.on_delete(&key)).await?;
            Ok(())
        }
        .boxed()
    }

    fn remove_file<'a>(&'a self, path: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            trace!("FS: remove_file {path:?}");
            self.inner.remove_file(path).await?;
            let key = path_key(path);
            self.with_backend(move |b| b.on_delete(&key)).await?;
            Ok(())
        }
        .boxed()
    }

    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        async move {
            trace!("FS: rename {from:?} {to:?}");
            // The source only resolves before the rename, the destination after.
            let source = self.resolve(from).await;
            self.inner.rename(from, to).await?;
            let destination = self.resolve(to).await;
            self.with_backend(move |b| b.on_move(source.as_ref(), destination.as_ref()))
                .await?;
            Ok(())
        }
        .boxed()
    }

    fn copy<'a>(&'a self, from: &'a DavPath, to: &'a DavPath) -> FsFuture<'a, ()> {
        self.inner.copy(from, to)
    }

    fn have_props<'a>(&'a self, path: &'a DavPath) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        async move { self.resolve(path).await.is_some() }.boxed()
    }

    fn patch_props<'a>(
        &'a self,
        path: &'a DavPath,
        patch: Vec<(bool, DavProp)>,
    ) -> FsFuture<'a, Vec<(StatusCode, DavProp)>> {
        async move {
            trace!("FS: patch_props {path:?} ({} changes)", patch.len());
            let node = match self.resolve(path).await {
                Some(node) => node,
                None => return Ok(Vec::new()),
            };

            // All or nothing: one protected property fails the whole request.
            if patch.iter().any(|(_, p)| is_protected(&prop_name(p))) {
                debug!("patch_props {path:?}: refusing protected property");
                let res = patch
                    .into_iter()
                    .map(|(_, p)| {
                        let status = if is_protected(&prop_name(&p)) {
                            StatusCode::FORBIDDEN
                        } else {
                            StatusCode::FAILED_DEPENDENCY
                        };
                        (status, bare_prop(p))
                    })
                    .collect();
                return Ok(res);
            }

            let changes: Vec<PropertyChange> = patch
                .iter()
                .map(|(set, p)| {
                    if *set {
                        PropertyChange::set(prop_name(p), prop_xml(p))
                    } else {
                        PropertyChange::remove(prop_name(p))
                    }
                })
                .collect();
            self.with_backend(move |b| b.patch(Some(&node), &changes))
                .await?;

            Ok(patch
                .into_iter()
                .map(|(_, p)| (StatusCode::OK, bare_prop(p)))
                .collect())
        }
        .boxed()
    }

    fn get_props<'a>(&'a self, path: &'a DavPath, do_content: bool) -> FsFuture<'a, Vec<DavProp>> {
        async move {
            trace!("FS: get_props {path:?}");
            let node = self.resolve(path).await;
            let props = self.with_backend(move |b| b.fetch_all(node.as_ref())).await?;
            Ok(props
                .into_iter()
                .map(|(name, xml)| {
                    let (namespace, name) = parse_clark(&name);
                    DavProp {
                        name,
                        prefix: None,
                        namespace,
                        xml: if do_content { Some(xml.into_bytes()) } else { None },
                    }
                })
                .collect())
        }
        .boxed()
    }

    fn get_prop<'a>(&'a self, path: &'a DavPath, prop: DavProp) -> FsFuture<'a, Vec<u8>> {
        async move {
            let name = prop_name(&prop);
            trace!("FS: get_prop {path:?} {name}");
            let node = self.resolve(path).await;
            let requested = vec![name.clone()];
            let mut props = self
                .with_backend(move |b| b.fetch(node.as_ref(), &requested))
                .await?;
            match props.remove(&name) {
                Some(xml) => Ok(xml.into_bytes()),
                None => Err(FsError::NotFound),
            }
        }
        .boxed()
    }

    fn get_quota<'a>(&'a self) -> FsFuture<'a, (u64, Option<u64>)> {
        self.inner.get_quota()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prop_xml_without_content() {
        let prop = DavProp {
            name: "color".to_string(),
            prefix: None,
            namespace: Some("http://example.com/ns".to_string()),
            xml: None,
        };
        assert_eq!(prop_xml(&prop), "<color xmlns=\"http://example.com/ns\"/>");
        assert_eq!(prop_name(&prop), "{http://example.com/ns}color");
    }

    #[test]
    fn test_bare_prop_drops_content() {
        let prop = DavProp {
            name: "color".to_string(),
            prefix: Some("Z".to_string()),
            namespace: None,
            xml: Some(b"<color>red</color>".to_vec()),
        };
        let bare = bare_prop(prop);
        assert!(bare.xml.is_none());
        assert_eq!(bare.prefix.as_deref(), Some("Z"));
    }
}
