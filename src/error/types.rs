//! Error types
//!
//! Defines domain-specific error types for each module of the FTP server.
//! Every per-session error knows the reply code it is reported with, so a
//! failing handler always answers with exactly one reply.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Authentication module errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Login incorrect for user: {0}")]
    LoginIncorrect(String),
    #[error("Anonymous password too long")]
    PasswordTooLong,
    #[error("Anonymous access is disabled")]
    AnonymousDisabled,
    #[error("User already logged in")]
    AlreadyLoggedIn,
    #[error("PASS issued before USER")]
    UserRequired,
}

impl AuthError {
    pub fn ftp_code(&self) -> u16 {
        match self {
            AuthError::InvalidUsername(_) | AuthError::MalformedInput(_) => 501,
            AuthError::AlreadyLoggedIn | AuthError::UserRequired => 503,
            AuthError::LoginIncorrect(_)
            | AuthError::PasswordTooLong
            | AuthError::AnonymousDisabled => 530,
        }
    }
}

/// Storage module errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Path rejected: {0}")]
    PathRejected(String),
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Operation not permitted on the root directory")]
    RootNotAllowed,
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl StorageError {
    /// Reply code for commands that only read or remove existing entries
    pub fn ftp_code(&self) -> u16 {
        550
    }

    /// Reply code for commands that create a new name (STOR, MKD, RNTO)
    pub fn ftp_code_for_create(&self) -> u16 {
        match self {
            StorageError::PathRejected(_) => 553,
            _ => 550,
        }
    }
}

/// Navigate module errors
#[derive(Debug, Error)]
pub enum NavigateError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),
}

impl NavigateError {
    pub fn ftp_code(&self) -> u16 {
        550
    }
}

/// Transfer module errors
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid PORT argument: {0}")]
    InvalidPortArgument(String),
    #[error("Failed to set up passive listener: {0}")]
    ListenerSetupFailed(io::Error),
    #[error("Passive mode needs an IPv4 control address, got {0}")]
    UnsupportedAddress(SocketAddr),
    #[error("Timed out establishing data connection")]
    ConnectionTimeout,
    #[error("Failed to establish data connection: {0}")]
    DataChannelSetupFailed(io::Error),
    #[error("Data connection from {provided} refused, expected {expected}")]
    PeerMismatch {
        expected: SocketAddr,
        provided: SocketAddr,
    },
}

impl TransferError {
    pub fn ftp_code(&self) -> u16 {
        match self {
            TransferError::InvalidPortArgument(_) => 501,
            TransferError::ListenerSetupFailed(_) | TransferError::UnsupportedAddress(_) => 421,
            TransferError::ConnectionTimeout
            | TransferError::DataChannelSetupFailed(_)
            | TransferError::PeerMismatch { .. } => 425,
        }
    }
}

/// Control line framing errors
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("Empty command line")]
    EmptyCommand,
    #[error("Malformed command verb: {0}")]
    MalformedVerb(String),
}

impl ProtocolError {
    pub fn ftp_code(&self) -> u16 {
        500
    }
}

/// Errors that stop the server itself; never raised once it is serving
#[derive(Debug, Error)]
pub enum FtpServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Server root {path} unusable: {source}")]
    ServerRoot { path: String, source: io::Error },
    #[error("Failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}
