//! File system storage management
//!
//! Handles path confinement, listing and file operations.

pub mod listing;
pub mod operations;
pub mod validation;

pub use listing::{DirectoryLister, ListingProducer};
pub use validation::{PathKind, VirtualPath, path_exists};
