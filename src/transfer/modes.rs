//! FTP Transfer modes
//!
//! Data mode bookkeeping and the six-octet `h1,h2,h3,h4,p1,p2` address
//! encoding shared by PORT and PASV.

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::TransferError;

/// How the next data connection is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataMode {
    #[default]
    None,
    /// Server connects out to the address given by PORT.
    Active(SocketAddrV4),
    /// Server accepts on the listener announced by PASV.
    Passive,
}

/// Parse a PORT argument into the client's data address.
pub fn parse_port_argument(arg: &str) -> Result<SocketAddrV4, TransferError> {
    let octets = arg
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| TransferError::InvalidPortArgument(arg.to_string()))?;

    match octets.as_slice() {
        [a, b, c, d, hi, lo] => Ok(SocketAddrV4::new(
            Ipv4Addr::new(*a, *b, *c, *d),
            u16::from(*hi) * 256 + u16::from(*lo),
        )),
        _ => Err(TransferError::InvalidPortArgument(arg.to_string())),
    }
}

/// Encode an address the way a 227 reply announces it.
pub fn encode_host_port(addr: &SocketAddrV4) -> String {
    let [a, b, c, d] = addr.ip().octets();
    let port = addr.port();
    format!("{},{},{},{},{},{}", a, b, c, d, port / 256, port % 256)
}
