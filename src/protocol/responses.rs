//! FTP Response handling
//!
//! Defines FTP response codes and multi-line reply framing.

pub const FILE_STATUS_OK: u16 = 150;
pub const OK: u16 = 200;
pub const UNKNOWN_COMMAND: u16 = 202;
pub const SYSTEM_TYPE: u16 = 215;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const NO_TRANSFER: u16 = 225;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const ENTERING_PASSIVE: u16 = 227;
pub const LOGIN_SUCCESS: u16 = 230;
pub const FILE_ACTION_OK: u16 = 250;
pub const PATH_CREATED: u16 = 257;
pub const PASSWORD_REQUIRED: u16 = 331;
pub const SERVICE_CLOSING: u16 = 421;
pub const CANT_OPEN_DATA: u16 = 425;
pub const LOCAL_ERROR: u16 = 451;
pub const SYNTAX_ERROR: u16 = 500;
pub const ARGUMENT_ERROR: u16 = 501;
pub const BAD_SEQUENCE: u16 = 503;
pub const PARAMETER_NOT_IMPLEMENTED: u16 = 504;
pub const AUTH_FAILED: u16 = 530;
pub const FILE_UNAVAILABLE: u16 = 550;
pub const NAME_NOT_ALLOWED: u16 = 553;

/// A numeric reply, possibly spanning several lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub message: String,
}

impl Reply {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Format an FTP reply.
///
/// The message is split at line feeds: interior lines are sent as
/// `DDD-text` and the final one as `DDD text`. A single trailing line feed
/// does not produce an extra empty line.
pub fn format_response(code: u16, message: &str) -> String {
    let body = message.strip_suffix('\n').unwrap_or(message);
    let mut lines = body.split('\n').peekable();
    let mut out = String::with_capacity(body.len() + 8);

    while let Some(line) = lines.next() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let separator = if lines.peek().is_some() { '-' } else { ' ' };
        out.push_str(&format!("{:03}{}{}\r\n", code, separator, line));
    }
    out
}
