//! The authentication-state source
//!
//! `AuthSession` is the only place the signed-in user changes. It publishes
//! the state on a watch channel; screens derive what to show from that value
//! and never keep their own "logged in" flag.

use std::sync::Arc;

use tokio::sync::watch;

use super::{AuthError, Credentials, IdentityProvider};
use crate::backend::RealtimeBackend;
use crate::config::MonitorConfig;
use crate::monitor::MonitorError;
use crate::types::profile::UserProfile;

/// Who is using the app
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn { user_id: String },
}

impl AuthState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            AuthState::SignedIn { user_id } => Some(user_id),
            AuthState::SignedOut => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthState::SignedIn { .. })
    }
}

/// Input of the registration form. `age` is raw text; anything that is not
/// a number is stored as no age.
#[derive(Clone, Debug)]
pub struct Registration {
    pub credentials: Credentials,
    pub name: String,
    pub age: String,
}

pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    backend: Arc<dyn RealtimeBackend>,
    config: MonitorConfig,
    state_tx: watch::Sender<AuthState>,
}

impl AuthSession {
    /// Start from whatever user the provider already has signed in
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        backend: Arc<dyn RealtimeBackend>,
        config: MonitorConfig,
    ) -> Self {
        let initial = match provider.current_user_id() {
            Some(user_id) => AuthState::SignedIn { user_id },
            None => AuthState::SignedOut,
        };
        let (state_tx, _) = watch::channel(initial);
        Self {
            provider,
            backend,
            config,
            state_tx,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// Receive every state change
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Id of the signed-in user
    pub fn user_id(&self) -> Result<String, MonitorError> {
        self.state()
            .user_id()
            .map(str::to_string)
            .ok_or_else(|| AuthError::NotSignedIn.into())
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<String, MonitorError> {
        match self.provider.sign_in(credentials).await {
            Ok(user_id) => {
                log::info!("Signed in as {}", user_id);
                self.state_tx.send_replace(AuthState::SignedIn {
                    user_id: user_id.clone(),
                });
                Ok(user_id)
            }
            Err(e) => {
                log::warn!("Sign-in failed for {}: {}", credentials.email, e);
                Err(auth_failure("Login failed", e))
            }
        }
    }

    /// Create the account, store the profile, then sign in.
    ///
    /// A failed profile write is returned as is and leaves the user signed out.
    pub async fn register(&self, registration: &Registration) -> Result<String, MonitorError> {
        let credentials = &registration.credentials;
        let user_id = match self.provider.register(credentials).await {
            Ok(user_id) => user_id,
            Err(e) => {
                log::warn!("Registration failed for {}: {}", credentials.email, e);
                return Err(auth_failure("Registration failed", e));
            }
        };

        let profile = UserProfile::from_input(&registration.name, &registration.age);
        let path = self.config.profile_path(&user_id)?;
        if let Err(e) = self.backend.write(&path, profile.to_value()).await {
            log::error!("Failed to store profile at {}: {}", path, e);
            return Err(e.into());
        }
        log::info!("Registered {} and stored profile", user_id);

        self.sign_in(credentials).await
    }

    pub async fn sign_out(&self) {
        self.provider.sign_out().await;
        log::info!("Signed out");
        self.state_tx.send_replace(AuthState::SignedOut);
    }

    /// Profile of the signed-in user
    pub async fn fetch_profile(&self) -> Result<Option<UserProfile>, MonitorError> {
        let user_id = self.user_id()?;
        let path = self.config.profile_path(&user_id)?;
        let snapshot = self.backend.get(&path).await?;
        Ok(snapshot.get::<UserProfile>()?)
    }
}

fn auth_failure(context: &str, e: AuthError) -> MonitorError {
    match MonitorError::from(e) {
        MonitorError::AuthFailure(reason) => {
            MonitorError::AuthFailure(format!("{}: {}", context, reason))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DbPath, InMemoryBackend};
    use crate::identity::InMemoryIdentityProvider;

    fn session() -> (Arc<InMemoryBackend>, AuthSession) {
        let backend = Arc::new(InMemoryBackend::new());
        let session = AuthSession::new(
            Arc::new(InMemoryIdentityProvider::new()),
            backend.clone(),
            MonitorConfig::default(),
        );
        (backend, session)
    }

    fn registration(age: &str) -> Registration {
        Registration {
            credentials: Credentials::new("ayu@example.com", "secret1"),
            name: "Ayu".to_string(),
            age: age.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_stores_profile_and_signs_in() {
        let (_backend, session) = session();
        let mut changes = session.watch();
        assert_eq!(session.state(), AuthState::SignedOut);

        let user_id = session.register(&registration("27")).await.unwrap();

        assert!(changes.has_changed().unwrap());
        assert_eq!(
            *changes.borrow_and_update(),
            AuthState::SignedIn { user_id: user_id.clone() }
        );
        assert_eq!(
            session.fetch_profile().await.unwrap(),
            Some(UserProfile::new("Ayu", Some(27)))
        );
    }

    #[tokio::test]
    async fn test_non_numeric_age_is_stored_as_none() {
        let (_backend, session) = session();
        session.register(&registration("unknown")).await.unwrap();
        assert_eq!(session.fetch_profile().await.unwrap().unwrap().age, None);
    }

    #[tokio::test]
    async fn test_profile_write_failure_stays_signed_out() {
        let (backend, session) = session();
        backend.deny(DbPath::parse("users").unwrap());

        let result = session.register(&registration("27")).await;

        assert!(matches!(result, Err(MonitorError::PermissionDenied(_))));
        assert_eq!(session.state(), AuthState::SignedOut);
    }

    #[tokio::test]
    async fn test_wrong_password_message() {
        let (_backend, session) = session();
        session.register(&registration("27")).await.unwrap();
        session.sign_out().await;

        let err = session
            .sign_in(&Credentials::new("ayu@example.com", "nope"))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Login failed: Invalid credentials");
        assert_eq!(session.state(), AuthState::SignedOut);
        assert!(matches!(
            session.user_id(),
            Err(MonitorError::AuthFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_registration_message() {
        let (_backend, session) = session();
        session.register(&registration("27")).await.unwrap();

        let err = session.register(&registration("27")).await.unwrap_err();

        assert_eq!(
            err.user_message(),
            "Registration failed: Email already in use: ayu@example.com"
        );
    }
}
