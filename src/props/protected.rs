// Live properties that belong to the file system and must never be
// written as dead properties.
use std::collections::HashSet;

pub const NS_OWNCLOUD: &str = "http://owncloud.org/ns";

lazy_static! {
    static ref PROTECTED: HashSet<String> = ["id", "permissions", "size", "downloadURL"]
        .iter()
        .map(|name| crate::util::clark_name(Some(NS_OWNCLOUD), name))
        .collect();
}

/// Is this (Clark notation) property name read-only for clients.
pub fn is_protected(name: &str) -> bool {
    PROTECTED.contains(name)
}
