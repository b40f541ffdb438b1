//! Module `command`
//!
//! Defines the FTP command set, the control line parser and the result type
//! every handler returns.

use crate::error::ProtocolError;
use crate::protocol::responses::{FILE_STATUS_OK, Reply};
use crate::transfer::TransferHandle;

/// Represents an FTP command parsed from the client input.
///
/// Arguments are kept verbatim; each handler parses its own grammar.
#[derive(Debug, PartialEq)]
pub enum Command {
    USER(String),
    PASS(String),
    SYST,
    TYPE(String),
    NOOP,
    PORT(String),
    PASV,
    CWD(String),
    CDUP,
    PWD,
    MKD(String),
    RMD(String),
    DELE(String),
    RNFR(String),
    RNTO(String),
    LIST(String),
    RETR(String),
    STOR(String),
    ABOR,
    QUIT,
    UNKNOWN(String),
}

impl Command {
    /// Verb used in logs
    pub fn verb(&self) -> &str {
        match self {
            Command::USER(_) => "USER",
            Command::PASS(_) => "PASS",
            Command::SYST => "SYST",
            Command::TYPE(_) => "TYPE",
            Command::NOOP => "NOOP",
            Command::PORT(_) => "PORT",
            Command::PASV => "PASV",
            Command::CWD(_) => "CWD",
            Command::CDUP => "CDUP",
            Command::PWD => "PWD",
            Command::MKD(_) => "MKD",
            Command::RMD(_) => "RMD",
            Command::DELE(_) => "DELE",
            Command::RNFR(_) => "RNFR",
            Command::RNTO(_) => "RNTO",
            Command::LIST(_) => "LIST",
            Command::RETR(_) => "RETR",
            Command::STOR(_) => "STOR",
            Command::ABOR => "ABOR",
            Command::QUIT => "QUIT",
            Command::UNKNOWN(verb) => verb,
        }
    }

    /// Whether the command is only available once logged in
    pub fn requires_login(&self) -> bool {
        !matches!(
            self,
            Command::USER(_)
                | Command::PASS(_)
                | Command::SYST
                | Command::TYPE(_)
                | Command::NOOP
                | Command::ABOR
                | Command::QUIT
                | Command::UNKNOWN(_)
        )
    }
}

/// Represents the outcome status of executing a command.
#[derive(Debug, PartialEq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Struct encapsulating the full result of a command execution.
///
/// `reply` is `None` only for commands that are deliberately ignored. A
/// `transfer` is handed to the worker after the reply has been sent.
pub struct CommandResult {
    pub status: CommandStatus,
    pub reply: Option<Reply>,
    pub transfer: Option<TransferHandle>,
}

impl CommandResult {
    pub fn success(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Success,
            reply: Some(Reply::new(code, message)),
            transfer: None,
        }
    }

    pub fn failure(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: CommandStatus::Failure(message.clone()),
            reply: Some(Reply::new(code, message)),
            transfer: None,
        }
    }

    pub fn close(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::CloseConnection,
            reply: Some(Reply::new(code, message)),
            transfer: None,
        }
    }

    pub fn ignored() -> Self {
        Self {
            status: CommandStatus::Success,
            reply: None,
            transfer: None,
        }
    }

    pub fn start_transfer(message: impl Into<String>, transfer: TransferHandle) -> Self {
        Self {
            status: CommandStatus::Success,
            reply: Some(Reply::new(FILE_STATUS_OK, message)),
            transfer: Some(transfer),
        }
    }
}

/// Parses a control line into a `Command`.
///
/// The verb is the leading run of ASCII letters and must be followed by a
/// space or the end of the line. Everything after that first space is the
/// argument, untouched.
pub fn parse_command(raw: &str) -> Result<Command, ProtocolError> {
    let verb_len = raw
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    if verb_len == 0 {
        return Err(if raw.is_empty() {
            ProtocolError::EmptyCommand
        } else {
            ProtocolError::MalformedVerb(raw.chars().take(16).collect())
        });
    }

    let (verb, rest) = raw.split_at(verb_len);
    let arg = match rest.strip_prefix(' ') {
        Some(arg) => arg.to_string(),
        None if rest.is_empty() => String::new(),
        None => return Err(ProtocolError::MalformedVerb(verb.to_string())),
    };

    let verb = verb.to_ascii_uppercase();
    Ok(match verb.as_str() {
        "USER" => Command::USER(arg),
        "PASS" => Command::PASS(arg),
        "SYST" => Command::SYST,
        "TYPE" => Command::TYPE(arg),
        "NOOP" => Command::NOOP,
        "PORT" => Command::PORT(arg),
        "PASV" => Command::PASV,
        "CWD" => Command::CWD(arg),
        "CDUP" => Command::CDUP,
        "PWD" => Command::PWD,
        "MKD" => Command::MKD(arg),
        "RMD" => Command::RMD(arg),
        "DELE" => Command::DELE(arg),
        "RNFR" => Command::RNFR(arg),
        "RNTO" => Command::RNTO(arg),
        "LIST" => Command::LIST(arg),
        "RETR" => Command::RETR(arg),
        "STOR" => Command::STOR(arg),
        "ABOR" => Command::ABOR,
        "QUIT" => Command::QUIT,
        _ => Command::UNKNOWN(verb),
    })
}
