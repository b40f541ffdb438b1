//! Storage operations
//!
//! Filesystem side of the FTP commands. Paths arrive already resolved; this
//! module maps them under the server root and performs the operation.

use log::info;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{self, File};

use crate::error::StorageError;
use crate::storage::listing::ListingProducer;
use crate::storage::validation::{PathKind, VirtualPath, path_exists};

/// Create a single directory
pub async fn make_directory(server_root: &Path, path: &VirtualPath) -> Result<(), StorageError> {
    fs::create_dir(path.to_real_path(server_root)).await?;
    info!("Created directory {}", path);
    Ok(())
}

/// Remove an empty directory; the root can never be removed
pub async fn remove_directory(
    server_root: &Path,
    path: &VirtualPath,
) -> Result<(), StorageError> {
    if path.is_root() {
        return Err(StorageError::RootNotAllowed);
    }
    fs::remove_dir(path.to_real_path(server_root)).await?;
    info!("Removed directory {}", path);
    Ok(())
}

/// Remove a regular file
pub async fn delete_file(server_root: &Path, path: &VirtualPath) -> Result<(), StorageError> {
    if !path_exists(server_root, path, PathKind::RegularFile).await {
        return Err(StorageError::FileNotFound(path.to_string()));
    }
    fs::remove_file(path.to_real_path(server_root)).await?;
    info!("Deleted file {}", path);
    Ok(())
}

/// Rename `from` to `to`, both inside the root
pub async fn rename_path(
    server_root: &Path,
    from: &VirtualPath,
    to: &VirtualPath,
) -> Result<(), StorageError> {
    if from.is_root() || to.is_root() {
        return Err(StorageError::RootNotAllowed);
    }
    fs::rename(from.to_real_path(server_root), to.to_real_path(server_root)).await?;
    info!("Renamed {} to {}", from, to);
    Ok(())
}

/// Open a regular file as a transfer source
pub async fn open_for_download(server_root: &Path, path: &VirtualPath) -> Result<File, StorageError> {
    if !path_exists(server_root, path, PathKind::RegularFile).await {
        return Err(StorageError::FileNotFound(path.to_string()));
    }
    Ok(File::open(path.to_real_path(server_root)).await?)
}

/// Create (or truncate) a file as a transfer sink
pub async fn open_for_upload(server_root: &Path, path: &VirtualPath) -> Result<File, StorageError> {
    if path.is_root() {
        return Err(StorageError::RootNotAllowed);
    }
    Ok(File::create(path.to_real_path(server_root)).await?)
}

/// Render the listing of `path` with the given producer on the blocking pool
pub async fn list_directory(
    server_root: &Path,
    path: &VirtualPath,
    producer: Arc<dyn ListingProducer>,
) -> Result<Vec<u8>, StorageError> {
    if !path_exists(server_root, path, PathKind::Any).await {
        return Err(StorageError::NotFound(path.to_string()));
    }
    let real_path = path.to_real_path(server_root);
    let listing = tokio::task::spawn_blocking(move || producer.produce_listing(&real_path))
        .await
        .map_err(|e| io::Error::other(e.to_string()))??;
    Ok(listing)
}
