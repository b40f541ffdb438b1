//! Configuration management for the RAX FTP daemon
//!
//! Settings are layered: built-in defaults, an optional `config.toml`, then
//! `RAX_FTPD_*` environment overrides. Everything here is read once at startup.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default configuration file name, looked up in the working directory.
const DEFAULT_CONFIG_FILE: &str = "config";

/// Environment variable naming an alternative configuration file.
const CONFIG_PATH_ENV: &str = "RAX_FTPD_CONFIG";

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    // ═══ NETWORK ═══
    /// IP address to bind the FTP control connection
    pub bind_address: String,

    /// Port for the FTP control connection (0 picks an ephemeral port)
    pub control_port: u16,

    /// Confinement root for every session
    pub server_root: String,

    // ═══ TRANSFER ═══
    /// Block size used by the transfer worker
    pub buffer_size: usize,

    /// Upper bound on data connection accept/connect
    pub connection_timeout_secs: u64,

    // ═══ PROTOCOL LIMITS ═══
    /// Longest accepted control line, excluding the terminator
    pub max_command_length: usize,
    pub max_username_length: usize,
    pub max_password_length: usize,

    // ═══ AUTHENTICATION ═══
    /// Delay applied before every authentication failure reply
    pub auth_failure_delay_ms: u64,
    pub allow_anonymous: bool,

    /// `username = "password"` table used by the default credential store
    pub users: HashMap<String, String>,

    /// Text of the 220 greeting, may span several lines
    pub greeting: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            control_port: 21,
            server_root: "/tmp".to_string(),
            buffer_size: 1024,
            connection_timeout_secs: 30,
            max_command_length: 1023,
            max_username_length: 64,
            max_password_length: 128,
            auth_failure_delay_ms: 1000,
            allow_anonymous: true,
            users: HashMap::new(),
            greeting: "RAX FTP server ready.".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the optional config file with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let settings = Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(Environment::with_prefix("RAX_FTPD").try_parsing(true))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.server_root.is_empty() {
            return Err(config::ConfigError::Message(
                "server_root cannot be empty".into(),
            ));
        }

        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_command_length == 0 {
            return Err(config::ConfigError::Message(
                "max_command_length must be greater than 0".into(),
            ));
        }

        if self.max_username_length == 0 || self.max_password_length == 0 {
            return Err(config::ConfigError::Message(
                "credential length limits must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and control port as a socket address string
    pub fn control_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    /// Get server root as PathBuf
    pub fn server_root_path(&self) -> PathBuf {
        PathBuf::from(&self.server_root)
    }

    /// Get data connection timeout as Duration
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn auth_failure_delay(&self) -> Duration {
        Duration::from_millis(self.auth_failure_delay_ms)
    }
}
