//! In-memory identity provider for tests and demos

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{AuthError, Credentials, IdentityProvider, MIN_PASSWORD_LEN};

struct Account {
    user_id: String,
    password_digest: String,
}

/// Accounts keyed by normalized email; passwords kept as salted digests.
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<String>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
        }
    }
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn digest(user_id: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail(email))
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in(&self, credentials: &Credentials) -> Result<String, AuthError> {
        let email = normalize_email(&credentials.email)?;
        let user_id = {
            let accounts = self
                .accounts
                .lock()
                .map_err(|_| AuthError::Unavailable("Failed to acquire lock".into()))?;
            let account = accounts.get(&email).ok_or(AuthError::InvalidCredentials)?;
            if account.password_digest != digest(&account.user_id, &credentials.password) {
                return Err(AuthError::InvalidCredentials);
            }
            account.user_id.clone()
        };

        let mut current = self
            .current
            .lock()
            .map_err(|_| AuthError::Unavailable("Failed to acquire lock".into()))?;
        *current = Some(user_id.clone());
        Ok(user_id)
    }

    async fn register(&self, credentials: &Credentials) -> Result<String, AuthError> {
        let email = normalize_email(&credentials.email)?;
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let mut accounts = self
            .accounts
            .lock()
            .map_err(|_| AuthError::Unavailable("Failed to acquire lock".into()))?;
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse(email));
        }

        let user_id = Uuid::new_v4().simple().to_string();
        let password_digest = digest(&user_id, &credentials.password);
        accounts.insert(
            email,
            Account {
                user_id: user_id.clone(),
                password_digest,
            },
        );
        Ok(user_id)
    }

    async fn sign_out(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }

    fn current_user_id(&self) -> Option<String> {
        self.current.lock().ok().and_then(|c| c.clone())
    }
}
