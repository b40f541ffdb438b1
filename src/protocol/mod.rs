//! FTP Protocol implementation
//!
//! Handles control line framing, command parsing, dispatch and reply
//! formatting.

pub mod commands;
pub mod handlers;
pub mod responses;
pub mod transport;

pub use commands::{Command, CommandResult, CommandStatus, parse_command};
pub use handlers::handle_command;
pub use responses::{Reply, format_response};
pub use transport::{LineReader, ReadLine, ReplyWriter};
