//! Admin credential store: registration and password authentication.
//!
//! Passwords are hashed with Argon2id into PHC strings, so the salt and the
//! cost parameters travel with each stored hash.

use crate::{
    models::{Admin, AdminId},
    repository::{RepositoryError, RepositoryState},
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("username and password are required")]
    InvalidInput,

    #[error("username already taken")]
    DuplicateUsername,

    /// Covers both an unknown username and a wrong password.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CredentialError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate => CredentialError::DuplicateUsername,
            other => CredentialError::Repository(other),
        }
    }
}

/// CredentialStore
///
/// Owns the admin rows through the repository. Cheap to clone.
#[derive(Clone)]
pub struct CredentialStore {
    repo: RepositoryState,
    hasher: Argon2<'static>,
}

impl CredentialStore {
    /// Creates a store hashing with the default Argon2id parameters.
    pub fn new(repo: RepositoryState) -> Self {
        Self::with_hasher(repo, Argon2::default())
    }

    /// Creates a store with explicit Argon2 parameters. Verification always uses
    /// the parameters recorded in the stored hash, so changing them here never
    /// locks out existing admins.
    pub fn with_hasher(repo: RepositoryState, hasher: Argon2<'static>) -> Self {
        Self { repo, hasher }
    }

    /// register
    ///
    /// Creates an admin. Both fields are trimmed first and must be non-empty.
    /// Writes exactly one row on success and nothing on failure.
    pub async fn register(&self, username: &str, password: &str) -> Result<Admin, CredentialError> {
        let (username, password) = normalize(username, password).ok_or(CredentialError::InvalidInput)?;

        // Cheap early answer; the UNIQUE constraint still decides races.
        if self.repo.find_admin_by_username(username).await?.is_some() {
            return Err(CredentialError::DuplicateUsername);
        }

        let password_hash = self.hash(password).await?;
        let admin = self.repo.insert_admin(username, &password_hash).await?;
        tracing::info!(admin_id = admin.id, username = %admin.username, "admin registered");
        Ok(admin)
    }

    /// authenticate
    ///
    /// Resolves a username/password pair to an admin id. Never reveals whether
    /// the username exists: both failure modes are `InvalidCredentials`.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<AdminId, CredentialError> {
        let (username, password) =
            normalize(username, password).ok_or(CredentialError::InvalidCredentials)?;

        let Some(admin) = self.repo.find_admin_by_username(username).await? else {
            // Spend the same hashing effort as a real verification.
            let _ = self.hash(password).await?;
            return Err(CredentialError::InvalidCredentials);
        };

        if self.verify(password, &admin.password_hash).await? {
            Ok(admin.id)
        } else {
            Err(CredentialError::InvalidCredentials)
        }
    }

    /// Whether at least one admin account exists.
    pub async fn has_admins(&self) -> Result<bool, CredentialError> {
        Ok(self.repo.count_admins().await? > 0)
    }

    async fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            hasher
                .hash_password(password.as_bytes(), &salt)
                .map(|hash| hash.to_string())
                .map_err(|e| CredentialError::Hashing(e.to_string()))
        })
        .await
        .map_err(|e| CredentialError::Hashing(e.to_string()))?
    }

    async fn verify(&self, password: &str, stored_hash: &str) -> Result<bool, CredentialError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let stored_hash = stored_hash.to_owned();
        tokio::task::spawn_blocking(move || {
            let Ok(parsed) = PasswordHash::new(&stored_hash) else {
                tracing::warn!("stored password hash is not a valid PHC string");
                return Ok(false);
            };
            match hasher.verify_password(password.as_bytes(), &parsed) {
                Ok(()) => Ok(true),
                Err(argon2::password_hash::Error::Password) => Ok(false),
                Err(e) => Err(CredentialError::Hashing(e.to_string())),
            }
        })
        .await
        .map_err(|e| CredentialError::Hashing(e.to_string()))?
    }
}

/// Trims both credentials; `None` if either ends up empty.
fn normalize<'a>(username: &'a str, password: &'a str) -> Option<(&'a str, &'a str)> {
    let username = username.trim();
    let password = password.trim();
    (!username.is_empty() && !password.is_empty()).then_some((username, password))
}
