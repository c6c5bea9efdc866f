//! Dead property storage.
//!
//! WebDAV clients can set arbitrary properties on any resource. The file
//! system does not know what to do with most of them, so they are kept
//! here, keyed by (user, path, property name).
//!
//! - [`PropertyStore`] is the durable part. [`SqliteStore`] implements it.
//! - [`PropertyBackend`] is what a request talks to. It binds the store to
//!   one authenticated user and keeps a [`PropertyCache`] for the lifetime
//!   of the request.
//!
//! Property names are in Clark notation (`{namespace}name`).
use std::collections::BTreeMap;

use crate::errors::PropResult;
use crate::util::normalize_path;

pub mod backend;
pub mod cache;
pub mod protected;
pub mod sqlite;

pub use backend::PropertyBackend;
pub use cache::PropertyCache;
pub use sqlite::{SqliteStore, StoreOptions};

/// Property name -> property value.
pub type PropertyMap = BTreeMap<String, String>;

/// One entry of a property patch. A `None` value removes the property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChange {
    pub name: String,
    pub value: Option<String>,
}

impl PropertyChange {
    pub fn set(name: impl Into<String>, value: impl Into<String>) -> PropertyChange {
        PropertyChange {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    pub fn remove(name: impl Into<String>) -> PropertyChange {
        PropertyChange {
            name: name.into(),
            value: None,
        }
    }
}

/// A durable property row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyRecord {
    pub user_id: String,
    pub path: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

/// A node the property store acts on.
///
/// Only files and directories get one. Anything else the tree can hand
/// out (pseudo nodes, unresolvable paths) is represented by the absence
/// of a `Node`, and the backend treats it as not applicable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    path: String,
    kind: NodeKind,
}

impl Node {
    pub fn new(path: &str, kind: NodeKind) -> Node {
        Node {
            path: normalize_path(path),
            kind,
        }
    }

    /// Normalized path, see [`normalize_path`].
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

/// Durable storage for dead properties.
///
/// Every call carries the user id; implementations must never touch rows
/// of another user. Calls are blocking round-trips.
pub trait PropertyStore: Send + Sync {
    /// Properties stored for (user, path). With `Some(names)`, only those
    /// names are read.
    fn select(&self, user: &str, path: &str, names: Option<&[String]>) -> PropResult<PropertyMap>;

    /// Apply a batch of changes for one path in a single transaction.
    ///
    /// Values are upserted, `None` values are deleted (deleting a missing
    /// property is not an error). If any statement fails, nothing of the
    /// batch is applied.
    fn apply(&self, user: &str, path: &str, changes: &[PropertyChange]) -> PropResult<()>;

    /// Delete every property of (user, path).
    fn delete_path(&self, user: &str, path: &str) -> PropResult<usize>;

    /// Move the properties of `from` and everything below it to `to`,
    /// replacing whatever the user had stored at `to`.
    ///
    /// Moving the root, or between paths where one contains the other,
    /// leaves the store untouched and returns 0.
    fn move_path(&self, user: &str, from: &str, to: &str) -> PropResult<usize>;
}
