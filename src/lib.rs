//! RAX FTP daemon
//!
//! A minimal FTP server: anonymous and named logins, a confined virtual
//! file system, and one background data transfer per session.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod navigate;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod transfer;

pub use config::ServerConfig;
pub use server::Server;
