//! Module `client`
//!
//! Defines the `Client` struct holding the per-connection protocol state:
//! authentication stage, identity, working directory, rename staging and
//! data mode. Only the session task mutates it.

use std::net::SocketAddr;

use crate::storage::VirtualPath;
use crate::transfer::DataMode;

/// Login progress of a session. Only moves forward, except that a failed
/// PASS returns to `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStage {
    #[default]
    Connected,
    AwaitingPassword,
    Ready,
}

/// Represents the state of a connected FTP client.
#[derive(Debug)]
pub struct Client {
    client_addr: SocketAddr,
    auth_stage: AuthStage,
    /// `None` while anonymous and before PASS
    username: Option<String>,
    working_directory: VirtualPath,
    rename_source: Option<VirtualPath>,
    data_mode: DataMode,
}

impl Client {
    pub fn new(client_addr: SocketAddr) -> Self {
        Self {
            client_addr,
            auth_stage: AuthStage::Connected,
            username: None,
            working_directory: VirtualPath::root(),
            rename_source: None,
            data_mode: DataMode::None,
        }
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    pub fn auth_stage(&self) -> AuthStage {
        self.auth_stage
    }

    /// Returns whether the client has successfully logged in.
    pub fn is_logged_in(&self) -> bool {
        self.auth_stage == AuthStage::Ready
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn working_directory(&self) -> &VirtualPath {
        &self.working_directory
    }

    pub fn data_mode(&self) -> DataMode {
        self.data_mode
    }

    // --------------------
    // Transitions
    // --------------------

    /// USER accepted; `None` selects anonymous login.
    pub fn begin_login(&mut self, username: Option<String>) {
        self.username = username;
        self.auth_stage = AuthStage::AwaitingPassword;
    }

    /// PASS accepted with the final session identity.
    pub fn complete_login(&mut self, identity: String) {
        self.username = Some(identity);
        self.auth_stage = AuthStage::Ready;
    }

    /// PASS rejected; the client has to start over with USER.
    pub fn reset_login(&mut self) {
        self.username = None;
        self.auth_stage = AuthStage::Connected;
    }

    pub fn set_working_directory(&mut self, path: VirtualPath) {
        self.working_directory = path;
    }

    pub fn stage_rename(&mut self, path: VirtualPath) {
        self.rename_source = Some(path);
    }

    /// Consume the staged rename source.
    pub fn take_rename_source(&mut self) -> Option<VirtualPath> {
        self.rename_source.take()
    }

    pub fn set_data_mode(&mut self, mode: DataMode) {
        self.data_mode = mode;
    }
}
