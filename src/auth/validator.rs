//! Authentication validator
//!
//! Input sanitation for USER/PASS, the anonymous identity rule and the
//! `Authenticator` seam used to verify named users.

use crate::config::ServerConfig;
use crate::error::AuthError;

/// Username that selects anonymous login
pub const ANONYMOUS_USER: &str = "anonymous";

/// Credential verification backend
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> bool;
}

/// Performs basic input sanitation to check for malicious or malformed usernames/passwords.
fn is_valid_input(input: &str, max_length: usize) -> bool {
    input.len() <= max_length && !input.contains(['\r', '\n', '\0'])
}

pub fn is_anonymous(username: &str) -> bool {
    username == ANONYMOUS_USER
}

/// Validates the USER argument before it is stored.
pub fn validate_user(username: &str, config: &ServerConfig) -> Result<(), AuthError> {
    if username.trim().is_empty() || !is_valid_input(username, config.max_username_length) {
        return Err(AuthError::InvalidUsername(username.to_string()));
    }
    if is_anonymous(username) && !config.allow_anonymous {
        return Err(AuthError::AnonymousDisabled);
    }
    Ok(())
}

/// Session identity for an anonymous login, `anonymous/<password>`.
pub fn anonymous_identity(password: &str, config: &ServerConfig) -> Result<String, AuthError> {
    if password.len() > config.max_password_length {
        return Err(AuthError::PasswordTooLong);
    }
    if !is_valid_input(password, config.max_password_length) {
        return Err(AuthError::MalformedInput("Invalid password format".into()));
    }
    Ok(format!("{}/{}", ANONYMOUS_USER, password))
}
