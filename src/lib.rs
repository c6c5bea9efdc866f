//! ## WebDAV front-end for cloud file storage
//!
//! This crate puts the [`dav_server`] webdav handler in front of a file
//! storage backend and adds what a multi-user cloud storage product needs
//! on top of it:
//!
//! - authentication: every request is mapped to a user by an [`Authenticator`].
//! - dead properties: properties a client sets with PROPPATCH that the
//!   filesystem knows nothing about are stored per user and per path in a
//!   [`PropertyStore`] (SQLite by default), follow the resource when it is
//!   moved, and disappear when it is deleted.
//! - locking: one of the handler's locksystems, with the authenticated user
//!   as the lock owner.
//!
//! The protocol itself (method dispatch, multistatus XML, locking
//! semantics) is entirely the handler's business.
//!
//! ## Property storage.
//!
//! The store is split in two:
//!
//! - [`PropertyStore`]: the durable part, shared by all requests. Every
//!   call takes the user id explicitly. Batches of changes are applied in
//!   one transaction as upserts, and moves rewrite the paths of a whole
//!   subtree.
//! - [`PropertyBackend`]: created per request for the authenticated user,
//!   with a private cache that is invalidated by every write.
//!
//! [`PropFs`] connects the two to the handler, by wrapping the real
//! filesystem and implementing the property calls of
//! [`DavFileSystem`](dav_server::fs::DavFileSystem).
//!
//! ## Example.
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::sync::Arc;
//!
//! use cloud_dav::{DavServer, LockSystem, SqliteStore, StoreOptions, UserTable};
//! use dav_server::localfs::LocalFs;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let addr = ([127, 0, 0, 1], 4918).into();
//!     let store = SqliteStore::open("/tmp/props.db", StoreOptions::default())?;
//!
//!     let server = DavServer::builder()
//!         .filesystem(LocalFs::new("/tmp/files", false, false, false))
//!         .store(Arc::new(store))
//!         .authenticator(Arc::new(UserTable::new().user("alice", "secret")))
//!         .locksystem(LockSystem::Mem)
//!         .build()?;
//!
//!     let make_service = hyper::service::make_service_fn(move |_| {
//!         let server = server.clone();
//!         async move {
//!             let func = move |req| {
//!                 let server = server.clone();
//!                 async move { Ok::<_, Infallible>(server.handle(req).await) }
//!             };
//!             Ok::<_, Infallible>(hyper::service::service_fn(func))
//!         }
//!     });
//!
//!     hyper::Server::bind(&addr).serve(make_service).await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

mod errors;
mod util;

pub mod body;
pub mod fs;
pub mod props;
pub mod server;

#[cfg(any(docsrs, feature = "warp-compat"))]
#[cfg_attr(docsrs, doc(cfg(feature = "warp-compat")))]
pub mod warp;

pub use crate::errors::{PropError, PropResult};
pub use crate::fs::PropFs;
pub use crate::props::{
    Node, NodeKind, PropertyBackend, PropertyChange, PropertyMap, PropertyRecord, PropertyStore,
    SqliteStore, StoreOptions,
};
pub use crate::server::{Authenticator, DavServer, DavServerBuilder, LockSystem, UserTable};
pub use crate::util::normalize_path;
