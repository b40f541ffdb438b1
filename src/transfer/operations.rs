//! Transfer operations
//!
//! Data channel setup for PASV and PORT, and spawning of the transfer worker.

use log::info;
use std::net::{IpAddr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::error::TransferError;
use crate::protocol::ReplyWriter;
use crate::transfer::data_channel::{DataEndpoint, canonical_ip};
use crate::transfer::handle::SharedTransfer;
use crate::transfer::modes::parse_port_argument;
use crate::transfer::worker::{WorkerSettings, run_transfer_worker};

/// Result of setting up passive mode
#[derive(Debug)]
pub struct PassiveModeResult {
    /// Address announced in the 227 reply
    pub data_socket: SocketAddrV4,
    pub endpoint: DataEndpoint,
}

/// Bind an ephemeral listener on the control connection's local address.
pub async fn setup_passive_mode(
    control_local: SocketAddr,
    client_addr: SocketAddr,
) -> Result<PassiveModeResult, TransferError> {
    let local_ip = match canonical_ip(control_local.ip()) {
        IpAddr::V4(ip) => ip,
        IpAddr::V6(_) => return Err(TransferError::UnsupportedAddress(control_local)),
    };

    let listener = TcpListener::bind(SocketAddrV4::new(local_ip, 0))
        .await
        .map_err(TransferError::ListenerSetupFailed)?;
    let port = listener
        .local_addr()
        .map_err(TransferError::ListenerSetupFailed)?
        .port();
    let data_socket = SocketAddrV4::new(local_ip, port);

    info!(
        "Client {} bound to data socket {} in PASV mode",
        client_addr, data_socket
    );

    Ok(PassiveModeResult {
        data_socket,
        endpoint: DataEndpoint::Passive {
            listener,
            owner_ip: canonical_ip(client_addr.ip()),
        },
    })
}

/// Parse the PORT argument into the endpoint the worker will connect to.
pub fn setup_active_mode(
    client_addr: SocketAddr,
    port_argument: &str,
) -> Result<SocketAddrV4, TransferError> {
    let data_socket = parse_port_argument(port_argument)?;
    info!(
        "Client {} announced data socket {} in PORT mode",
        client_addr, data_socket
    );
    Ok(data_socket)
}

/// Spawn the worker serving the next transfer of a session.
pub fn spawn_transfer_worker(
    endpoint: DataEndpoint,
    shared: Arc<SharedTransfer>,
    replies: ReplyWriter,
    settings: WorkerSettings,
) -> JoinHandle<()> {
    tokio::spawn(run_transfer_worker(endpoint, shared, replies, settings))
}
