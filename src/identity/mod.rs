//! Identity management for the monitor
//!
//! This module handles sign-in and registration against the identity
//! collaborator, the single authentication-state source the app reacts to,
//! and the screen routing derived from that state.

mod memory;
pub mod navigation;
pub mod session;

pub use memory::InMemoryIdentityProvider;
pub use navigation::{route, Navigator, Screen};
pub use session::{AuthSession, AuthState, Registration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for authentication operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already in use: {0}")]
    EmailInUse(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Password must be at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Identity service unavailable: {0}")]
    Unavailable(String),
}

/// Shortest password the identity service accepts
pub const MIN_PASSWORD_LEN: usize = 6;

/// Email and password as typed by the user
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The identity service. Every heart-rate path is scoped by the user id it
/// hands out.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in and return the user id
    async fn sign_in(&self, credentials: &Credentials) -> Result<String, AuthError>;

    /// Create an account and return its user id. Does not sign in.
    async fn register(&self, credentials: &Credentials) -> Result<String, AuthError>;

    async fn sign_out(&self);

    /// Id of the signed-in user, if any
    fn current_user_id(&self) -> Option<String>;
}
