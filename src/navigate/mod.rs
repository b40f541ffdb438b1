//! Navigate module
//!
//! Handles directory navigation for FTP clients: changing directories and
//! keeping the working directory valid across RMD and RNTO.

mod operations;

// Re-export public types and functions
pub use operations::{change_directory, working_dir_after_remove, working_dir_after_rename};
