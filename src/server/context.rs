//! Server context
//!
//! Everything a session borrows from the server: configuration, the
//! canonical confinement root and the external collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::storage::ListingProducer;
use crate::transfer::WorkerSettings;

/// Shared, read-only state handed to every session
#[derive(Clone)]
pub struct ServerContext {
    pub config: Arc<ServerConfig>,
    server_root: PathBuf,
    pub authenticator: Arc<dyn Authenticator>,
    pub listing_producer: Arc<dyn ListingProducer>,
}

impl ServerContext {
    pub fn new(
        config: Arc<ServerConfig>,
        server_root: PathBuf,
        authenticator: Arc<dyn Authenticator>,
        listing_producer: Arc<dyn ListingProducer>,
    ) -> Self {
        Self {
            config,
            server_root,
            authenticator,
            listing_producer,
        }
    }

    /// Canonical confinement root
    pub fn server_root(&self) -> &Path {
        &self.server_root
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            buffer_size: self.config.buffer_size,
            connection_timeout: self.config.connection_timeout(),
        }
    }
}
