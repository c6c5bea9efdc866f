//! Filesystem adapters.
pub mod propfs;

pub use propfs::PropFs;
