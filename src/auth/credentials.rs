//! Credential storage and management
//!
//! Default `Authenticator`: a username/password table loaded from the
//! `[users]` section of the configuration.

use std::collections::HashMap;

use crate::auth::validator::Authenticator;

/// In-memory credential table
#[derive(Debug, Default, Clone)]
pub struct CredentialStore {
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(credentials: HashMap<String, String>) -> Self {
        Self { credentials }
    }
}

impl Authenticator for CredentialStore {
    fn authenticate(&self, username: &str, password: &str) -> bool {
        matches!(self.credentials.get(username), Some(stored) if stored == password)
    }
}
