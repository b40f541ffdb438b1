//! Error handlers
//!
//! Logging of per-session failures before they are turned into replies.

use log::{error, warn};
use std::net::SocketAddr;

use crate::error::types::{FtpServerError, StorageError};

/// Handle a fatal server error
pub fn handle_error(err: &FtpServerError) {
    error!("FTP Server Error: {}", err);
}

/// Log a storage failure for a client, at a level matching its severity
pub fn log_storage_error(client_addr: &SocketAddr, command: &str, err: &StorageError) {
    match err {
        StorageError::IoError(e) => {
            error!("{} failed for client {}: {}", command, client_addr, e)
        }
        other => warn!("{} refused for client {}: {}", command, client_addr, other),
    }
}
