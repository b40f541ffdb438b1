//! Navigation operations implementation

use std::path::Path;

use crate::error::NavigateError;
use crate::storage::{PathKind, VirtualPath, path_exists};

/// Changes the working directory for a client
pub async fn change_directory(
    server_root: &Path,
    current: &VirtualPath,
    target_path: &str,
) -> Result<VirtualPath, NavigateError> {
    let new_path = current
        .resolve(target_path)
        .map_err(|e| NavigateError::InvalidPath(e.to_string()))?;

    if !path_exists(server_root, &new_path, PathKind::Directory).await {
        return Err(NavigateError::DirectoryNotFound(new_path.to_string()));
    }

    Ok(new_path)
}

/// Working directory after `removed` was deleted: removing the working
/// directory moves the session to its parent.
pub fn working_dir_after_remove(current: &VirtualPath, removed: &VirtualPath) -> VirtualPath {
    if current == removed {
        removed.parent()
    } else {
        current.clone()
    }
}

/// Working directory after `from` was renamed to `to`: a working directory
/// at or below `from` follows the rename.
pub fn working_dir_after_rename(
    current: &VirtualPath,
    from: &VirtualPath,
    to: &VirtualPath,
) -> VirtualPath {
    current.rebase(from, to).unwrap_or_else(|| current.clone())
}
