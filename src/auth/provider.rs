use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

/// The signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

/// Provider failure. `message` is shown to the user verbatim when present.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", message.as_deref().unwrap_or("authentication provider failure"))]
pub struct ProviderError {
    pub message: Option<String>,
}

impl ProviderError {
    fn msg(m: &str) -> Self {
        Self {
            message: Some(m.to_string()),
        }
    }

    /// Returns the provider message, or `fallback` when it gave none.
    pub fn message_or(&self, fallback: &str) -> String {
        self.message.clone().unwrap_or_else(|| fallback.to_string())
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Creates the account and signs it in.
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;
    fn sign_out(&self);
    fn current_identity(&self) -> Option<Identity>;
    async fn send_password_reset_email(&self, email: &str) -> Result<(), ProviderError>;
    /// Fires on every sign-in and sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn hash_password(plain: &str) -> Result<String, ProviderError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            ProviderError { message: None }
        })
}

fn verify_password(plain: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!(error = %e, "argon2 parse hash error");
            false
        }
    }
}

const BAD_EMAIL: &str = "The email address is badly formatted.";
const WEAK_PASSWORD: &str = "The given password is invalid. [ Password should be at least 6 characters ]";
const EMAIL_TAKEN: &str = "The email address is already in use by another account.";
const NO_USER: &str =
    "There is no user record corresponding to this identifier. The user may have been deleted.";
const WRONG_PASSWORD: &str = "The password is invalid or the user does not have a password.";

struct Account {
    uid: String,
    password_hash: String,
}

/// Email/password accounts kept in process memory. Stands in for the hosted
/// provider; going offline makes every call fail without a message.
pub struct InMemoryAuthProvider {
    accounts: Mutex<HashMap<String, Account>>,
    current: watch::Sender<Option<Identity>>,
    reset_requests: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl Default for InMemoryAuthProvider {
    fn default() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: watch::channel(None).0,
            reset_requests: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Addresses a reset email was sent to, oldest first.
    pub fn reset_requests(&self) -> Vec<String> {
        self.reset_requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn check_online(&self) -> Result<(), ProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            warn!("auth provider unreachable");
            return Err(ProviderError { message: None });
        }
        Ok(())
    }

    fn accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl AuthProvider for InMemoryAuthProvider {
    async fn create_account(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        self.check_online()?;
        let email = normalize(email);
        if !is_valid_email(&email) {
            return Err(ProviderError::msg(BAD_EMAIL));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ProviderError::msg(WEAK_PASSWORD));
        }
        if self.accounts().contains_key(&email) {
            return Err(ProviderError::msg(EMAIL_TAKEN));
        }

        let password_hash = hash_password(password)?;
        let uid = Uuid::new_v4().simple().to_string();
        self.accounts().insert(
            email.clone(),
            Account {
                uid: uid.clone(),
                password_hash,
            },
        );

        let identity = Identity { uid, email };
        info!(uid = %identity.uid, "account created");
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        self.check_online()?;
        let email = normalize(email);
        if !is_valid_email(&email) {
            return Err(ProviderError::msg(BAD_EMAIL));
        }

        let (uid, hash) = match self.accounts().get(&email) {
            Some(a) => (a.uid.clone(), a.password_hash.clone()),
            None => return Err(ProviderError::msg(NO_USER)),
        };
        if !verify_password(password, &hash) {
            warn!(%uid, "sign in rejected");
            return Err(ProviderError::msg(WRONG_PASSWORD));
        }

        let identity = Identity { uid, email };
        debug!(uid = %identity.uid, "signed in");
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    fn sign_out(&self) {
        if self.current.send_replace(None).is_some() {
            debug!("signed out");
        }
    }

    fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), ProviderError> {
        self.check_online()?;
        let email = normalize(email);
        if !is_valid_email(&email) {
            return Err(ProviderError::msg(BAD_EMAIL));
        }
        if !self.accounts().contains_key(&email) {
            return Err(ProviderError::msg(NO_USER));
        }
        self.reset_requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}
