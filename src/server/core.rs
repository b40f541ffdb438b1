use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::auth::{Authenticator, CredentialStore};
use crate::client::handle_client;
use crate::config::ServerConfig;
use crate::error::FtpServerError;
use crate::middleware::logging::log_connection;
use crate::server::ServerContext;
use crate::storage::{DirectoryLister, ListingProducer};

/// The FTP server: a bound control listener plus the context every session
/// is started with.
pub struct Server {
    listener: TcpListener,
    context: ServerContext,
}

impl Server {
    /// Validate the configuration, prepare the server root and bind the
    /// control listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, FtpServerError> {
        config.validate()?;

        let root = config.server_root_path();
        let prepared = match tokio::fs::create_dir_all(&root).await {
            Ok(()) => tokio::fs::canonicalize(&root).await,
            Err(e) => Err(e),
        };
        let server_root = prepared.map_err(|source| FtpServerError::ServerRoot {
            path: config.server_root.clone(),
            source,
        })?;
        info!("Server root directory: {}", server_root.display());

        let addr = config.control_socket();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!("Server bound to {}", addr);
                listener
            }
            Err(source) => return Err(FtpServerError::Bind { addr, source }),
        };

        let authenticator: Arc<dyn Authenticator> =
            Arc::new(CredentialStore::new(config.users.clone()));
        let listing_producer: Arc<dyn ListingProducer> = Arc::new(DirectoryLister);

        Ok(Self {
            listener,
            context: ServerContext::new(
                Arc::new(config),
                server_root,
                authenticator,
                listing_producer,
            ),
        })
    }

    /// Replace the credential check used for named users.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.context.authenticator = authenticator;
        self
    }

    /// Replace the producer of LIST output.
    pub fn with_listing_producer(mut self, producer: Arc<dyn ListingProducer>) -> Self {
        self.context.listing_producer = producer;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, FtpServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept control connections forever, one task per session.
    pub async fn start(self) {
        info!(
            "Starting RAX FTP server on {}",
            self.listener
                .local_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| self.context.config.control_socket())
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    log_connection(&addr);
                    let context = self.context.clone();

                    // Spawn a task for each client so accept loop doesn't block
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, addr, context).await {
                            warn!("Failed to handle client {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }
}
