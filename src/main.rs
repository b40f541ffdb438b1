//! RAX FTP daemon - Entry Point
//!
//! Loads the layered configuration, binds the control listener and serves
//! clients until the process is killed.

use env_logger::{Builder, Env};
use log::info;
use std::io::Write;
use std::process;

use rax_ftpd::error::handlers::handle_error;
use rax_ftpd::error::FtpServerError;
use rax_ftpd::{Server, ServerConfig};

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default filter
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(buf, "[{}] [{}] {}", timestamp, record.level(), record.args())
        })
        .init();

    info!("Launching FTP server...");

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            handle_error(&FtpServerError::Config(e));
            process::exit(1);
        }
    };

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            handle_error(&e);
            process::exit(1);
        }
    };

    server.start().await;
}
