//! Logging middleware
//!
//! Provides request logging functionality.

use log::info;
use std::net::SocketAddr;

use crate::protocol::Command;

/// Log a client connection
pub fn log_connection(client_addr: &SocketAddr) {
    info!("Client connected: {}", client_addr);
}

/// Log a client command. Passwords never reach the log.
pub fn log_command(client_addr: &SocketAddr, command: &Command) {
    info!("Client {} executed: {}", client_addr, describe_command(command));
}

fn describe_command(command: &Command) -> String {
    match command {
        Command::PASS(_) => "PASS ****".to_string(),
        Command::USER(arg)
        | Command::TYPE(arg)
        | Command::PORT(arg)
        | Command::CWD(arg)
        | Command::MKD(arg)
        | Command::RMD(arg)
        | Command::DELE(arg)
        | Command::RNFR(arg)
        | Command::RNTO(arg)
        | Command::LIST(arg)
        | Command::RETR(arg)
        | Command::STOR(arg)
            if !arg.is_empty() =>
        {
            format!("{} {}", command.verb(), arg)
        }
        other => other.verb().to_string(),
    }
}
