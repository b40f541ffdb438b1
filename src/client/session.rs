//! Client session management
//!
//! A `Session` owns one control connection's state and its transfer worker.
//! The worker is spawned by PORT/PASV and shares only the transfer slot and
//! the reply writer with the session.

use log::{debug, info, warn};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::client::Client;
use crate::protocol::ReplyWriter;
use crate::server::ServerContext;
use crate::transfer::{
    DataEndpoint, DataMode, SharedTransfer, TransferHandle, TransferStats, spawn_transfer_worker,
};

/// Manages one client's session lifecycle
pub struct Session {
    client: Client,
    local_addr: SocketAddr,
    replies: ReplyWriter,
    transfer: Arc<SharedTransfer>,
    worker: Option<JoinHandle<()>>,
    context: ServerContext,
}

impl Session {
    pub fn new(
        client_addr: SocketAddr,
        local_addr: SocketAddr,
        replies: ReplyWriter,
        context: ServerContext,
    ) -> Self {
        Self {
            client: Client::new(client_addr),
            local_addr,
            replies,
            transfer: Arc::new(SharedTransfer::new()),
            worker: None,
            context,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    pub fn server_root(&self) -> &Path {
        self.context.server_root()
    }

    /// Local address of the control connection
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn transfer_in_progress(&self) -> bool {
        self.transfer.in_progress().await
    }

    /// Forget the data mode once the worker has retired on its own, so a new
    /// PORT/PASV is required for the next transfer. A retired worker only has
    /// its final reply left to send, so its task is detached.
    pub async fn reap_worker(&mut self) {
        if self.worker.is_some() && !self.transfer.is_armed().await {
            self.worker = None;
            self.client.set_data_mode(DataMode::None);
            debug!("Transfer worker for {} reaped", self.client.client_addr());
        }
    }

    /// Cancel the worker (idle or transferring) and wait for it to exit.
    pub async fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.transfer.cancel().await;
            if let Err(e) = worker.await {
                warn!(
                    "Transfer worker for {} ended abnormally: {}",
                    self.client.client_addr(),
                    e
                );
            }
            self.transfer.finish().await;
        }
        self.client.set_data_mode(DataMode::None);
    }

    /// Replace any previous worker with one serving `endpoint`.
    pub async fn start_worker(&mut self, endpoint: DataEndpoint, mode: DataMode) {
        self.stop_worker().await;
        self.transfer.rearm().await;
        self.worker = Some(spawn_transfer_worker(
            endpoint,
            Arc::clone(&self.transfer),
            self.replies.clone(),
            self.context.worker_settings(),
        ));
        self.client.set_data_mode(mode);
    }

    /// Hand a freshly opened source/sink to the worker.
    pub async fn begin_transfer(&self, handle: TransferHandle) {
        debug!(
            "Starting {:?} transfer for {}",
            handle.direction(),
            self.client.client_addr()
        );
        self.transfer.install(handle).await;
    }

    pub async fn transfer_stats(&self) -> TransferStats {
        self.transfer.stats().await
    }

    /// Release everything the session holds.
    pub async fn close(&mut self) {
        self.stop_worker().await;
        let stats = self.transfer_stats().await;
        info!(
            "Session {} ({}) closed: {} files, {} bytes transferred",
            self.client.client_addr(),
            self.client.username().unwrap_or("not logged in"),
            stats.files,
            stats.bytes
        );
    }
}
