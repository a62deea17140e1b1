//! Caller-side storage for ceremonies
//!
//! The engine keeps no state between calls. Challenges, users and their
//! credentials live behind these traits and are handed to the HTTP layer
//! as injected application data.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::webauthn::{RegistrationResult, UserEntity};

/// Storage errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("challenge not found or expired")]
    ChallengeNotFound,
    #[error("user already registered: {0}")]
    UserExists(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("sign count changed concurrently: expected {expected}, found {stored}")]
    SignCountConflict { expected: u32, stored: u32 },
    #[error("store lock poisoned")]
    Poisoned,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Poisoned)
}

/// Which ceremony a challenge was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CeremonyKind {
    Registration,
    Login,
}

/// State remembered between a begin and a finish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCeremony {
    pub user_name: String,
    pub kind: CeremonyKind,
    pub created_at: DateTime<Utc>,
}

impl PendingCeremony {
    #[must_use]
    pub fn new(user_name: impl Into<String>, kind: CeremonyKind) -> Self {
        Self {
            user_name: user_name.into(),
            kind,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }
}

/// Single-use challenge storage
pub trait ChallengeStore: Send + Sync {
    /// Remember a freshly issued challenge
    ///
    /// # Errors
    /// Returns an error if the store is unavailable.
    fn save_challenge(&self, challenge: &str, pending: PendingCeremony) -> Result<(), StoreError>;

    /// Remove a challenge and return its state
    ///
    /// The challenge is consumed even when the kind does not match or it has
    /// expired.
    ///
    /// # Errors
    /// Returns `ChallengeNotFound` for unknown, expired or mismatched challenges.
    fn take_challenge(
        &self,
        challenge: &str,
        kind: CeremonyKind,
    ) -> Result<PendingCeremony, StoreError>;
}

/// A registered credential as persisted by the relying party
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub credential_id: String,
    pub public_key: Vec<u8>,
    pub sign_count: u32,
    pub aaguid: String,
    pub authenticator_name: String,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
}

impl From<RegistrationResult> for StoredCredential {
    fn from(result: RegistrationResult) -> Self {
        Self {
            credential_id: result.credential_id,
            public_key: result.public_key,
            sign_count: result.sign_count,
            aaguid: result.aaguid,
            authenticator_name: result.authenticator_name,
            created_at: Utc::now(),
            last_used: None,
        }
    }
}

/// A user and the credential registered for them, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user: UserEntity,
    pub credential: Option<StoredCredential>,
}

/// User and credential storage, keyed by user name
pub trait CredentialStore: Send + Sync {
    /// # Errors
    /// Returns `UserExists` if the name is taken.
    fn create_user(&self, user: UserEntity) -> Result<(), StoreError>;

    /// # Errors
    /// Returns `UserNotFound` for unknown names.
    fn get_user(&self, name: &str) -> Result<UserRecord, StoreError>;

    /// # Errors
    /// Returns `UserNotFound` for unknown names.
    fn save_credential(&self, name: &str, credential: StoredCredential) -> Result<(), StoreError>;

    /// Persist the counter after a successful login
    ///
    /// The write only happens while the stored counter still equals
    /// `expected`, the value the assertion was validated against.
    ///
    /// # Errors
    /// Returns `UserNotFound` if the user or their credential is missing and
    /// `SignCountConflict` if another login moved the counter first.
    fn update_sign_count(
        &self,
        name: &str,
        expected: u32,
        sign_count: u32,
    ) -> Result<(), StoreError>;
}

/// In-memory challenge store with expiry
#[derive(Debug)]
pub struct InMemoryChallengeStore {
    ttl: Duration,
    challenges: Mutex<HashMap<String, PendingCeremony>>,
}

impl InMemoryChallengeStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            challenges: Mutex::new(HashMap::new()),
        }
    }

    /// Store whose challenges live as long as the ceremony timeout
    #[must_use]
    pub fn with_timeout_ms(timeout_ms: u32) -> Self {
        Self::new(Duration::milliseconds(i64::from(timeout_ms)))
    }

    /// Number of challenges currently held
    ///
    /// # Errors
    /// Returns `Poisoned` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(lock(&self.challenges)?.len())
    }
}

impl ChallengeStore for InMemoryChallengeStore {
    fn save_challenge(&self, challenge: &str, pending: PendingCeremony) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut challenges = lock(&self.challenges)?;
        challenges.retain(|_, p| !p.is_expired(self.ttl, now));
        challenges.insert(challenge.to_string(), pending);
        Ok(())
    }

    fn take_challenge(
        &self,
        challenge: &str,
        kind: CeremonyKind,
    ) -> Result<PendingCeremony, StoreError> {
        let pending = lock(&self.challenges)?
            .remove(challenge)
            .ok_or(StoreError::ChallengeNotFound)?;
        if pending.kind != kind || pending.is_expired(self.ttl, Utc::now()) {
            return Err(StoreError::ChallengeNotFound);
        }
        Ok(pending)
    }
}

/// In-memory user and credential store
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn create_user(&self, user: UserEntity) -> Result<(), StoreError> {
        let mut users = lock(&self.users)?;
        if users.contains_key(&user.name) {
            return Err(StoreError::UserExists(user.name));
        }
        users.insert(
            user.name.clone(),
            UserRecord {
                user,
                credential: None,
            },
        );
        Ok(())
    }

    fn get_user(&self, name: &str) -> Result<UserRecord, StoreError> {
        lock(&self.users)?
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))
    }

    fn save_credential(&self, name: &str, credential: StoredCredential) -> Result<(), StoreError> {
        let mut users = lock(&self.users)?;
        let record = users
            .get_mut(name)
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))?;
        record.credential = Some(credential);
        Ok(())
    }

    fn update_sign_count(
        &self,
        name: &str,
        expected: u32,
        sign_count: u32,
    ) -> Result<(), StoreError> {
        let mut users = lock(&self.users)?;
        let credential = users
            .get_mut(name)
            .and_then(|record| record.credential.as_mut())
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))?;
        if credential.sign_count != expected {
            return Err(StoreError::SignCountConflict {
                expected,
                stored: credential.sign_count,
            });
        }
        credential.sign_count = sign_count;
        credential.last_used = Some(Utc::now());
        Ok(())
    }
}
