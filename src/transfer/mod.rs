//! Transfer module for FTP server
//!
//! Handles data channel establishment, the shared transfer handle and the
//! background worker that streams file and listing data.

pub mod data_channel;
pub mod handle;
pub mod modes;
pub mod operations;
pub mod worker;

// Re-export key types and functions
pub use data_channel::DataEndpoint;
pub use handle::{Direction, SharedTransfer, TransferHandle, TransferStats};
pub use modes::{DataMode, encode_host_port};
pub use operations::{setup_active_mode, setup_passive_mode, spawn_transfer_worker};
pub use worker::WorkerSettings;
