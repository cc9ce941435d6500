//! Password hashing and login sessions
//!
//! Passwords are stored as Argon2id PHC strings. Sessions are opaque random
//! bearer tokens held in process memory with a fixed time-to-live.

use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::{distr::Alphanumeric, Rng};
use thiserror::Error;

const TOKEN_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hash error: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    Malformed(String),
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::Malformed(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Random alphanumeric string from the thread-local CSPRNG
pub(crate) fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

struct Session {
    user_id: u64,
    expires_at: DateTime<Utc>,
}

/// In-process session table
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a session for `user_id` and returns its token
    pub fn create(&self, user_id: u64) -> String {
        let now = Utc::now();
        let token = random_token(TOKEN_LENGTH);

        let mut sessions = self.sessions.lock();
        sessions.retain(|_, session| session.expires_at > now);
        sessions.insert(
            token.clone(),
            Session {
                user_id,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// User id behind a live token; expired tokens are dropped on sight
    pub fn resolve(&self, token: &str) -> Option<u64> {
        let mut sessions = self.sessions.lock();
        let (user_id, expires_at) = sessions
            .get(token)
            .map(|session| (session.user_id, session.expires_at))?;
        if expires_at <= Utc::now() {
            sessions.remove(token);
            return None;
        }
        Some(user_id)
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.lock().remove(token).is_some()
    }

    /// Ends every session of one user; returns how many were dropped
    pub fn revoke_user(&self, user_id: u64) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        before - sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::hours(24))
    }
}
