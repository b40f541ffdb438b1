//! Authentication system
//!
//! Handles the anonymous login rules and credential verification.

pub mod credentials;
pub mod validator;

pub use credentials::CredentialStore;
pub use validator::{
    ANONYMOUS_USER, Authenticator, anonymous_identity, is_anonymous, validate_user,
};
