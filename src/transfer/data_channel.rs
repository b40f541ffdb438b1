//! Module `data_channel`
//!
//! Establishes the data connection for a transfer: accepting on the PASV
//! listener or connecting out to the PORT address. Both are bounded by the
//! configured connection timeout.

use log::{info, warn};
use std::net::{IpAddr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::error::TransferError;

/// Where the worker gets its data connection from.
#[derive(Debug)]
pub enum DataEndpoint {
    /// Accept one connection; only `owner_ip` may connect.
    Passive {
        listener: TcpListener,
        owner_ip: IpAddr,
    },
    /// Connect to the address announced by PORT.
    Active(SocketAddrV4),
}

impl DataEndpoint {
    /// Open the data connection.
    pub async fn establish(self, limit: Duration) -> Result<TcpStream, TransferError> {
        match self {
            DataEndpoint::Passive { listener, owner_ip } => {
                accept_from_owner(listener, owner_ip, limit).await
            }
            DataEndpoint::Active(addr) => connect_to_client(addr, limit).await,
        }
    }
}

async fn accept_from_owner(
    listener: TcpListener,
    owner_ip: IpAddr,
    limit: Duration,
) -> Result<TcpStream, TransferError> {
    let (stream, peer_addr) = timeout(limit, listener.accept())
        .await
        .map_err(|_| TransferError::ConnectionTimeout)?
        .map_err(TransferError::DataChannelSetupFailed)?;

    if !same_host(peer_addr.ip(), owner_ip) {
        warn!(
            "Rejected passive data connection from {} (control peer {})",
            peer_addr, owner_ip
        );
        return Err(TransferError::PeerMismatch {
            expected: SocketAddr::new(owner_ip, 0),
            provided: peer_addr,
        });
    }

    info!("Passive data connection accepted from {}", peer_addr);
    Ok(stream)
}

async fn connect_to_client(addr: SocketAddrV4, limit: Duration) -> Result<TcpStream, TransferError> {
    let stream = timeout(limit, TcpStream::connect(addr))
        .await
        .map_err(|_| TransferError::ConnectionTimeout)?
        .map_err(TransferError::DataChannelSetupFailed)?;

    info!("Active data connection established to {}", addr);
    Ok(stream)
}

fn same_host(a: IpAddr, b: IpAddr) -> bool {
    canonical_ip(a) == canonical_ip(b)
}

/// Collapse IPv4-mapped IPv6 addresses onto their IPv4 form.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    }
}
