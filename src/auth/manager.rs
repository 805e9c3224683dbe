//! Authentication manager for Vestibule
//!
//! Verifies presented credentials and provisions users. Provisioning writes
//! through to the configured user storage before the in-memory store is
//! touched, so a failed write leaves nothing visible.

use super::middleware::AuthError;
use super::password::{hash_cost, PasswordHasher};
use super::store::{CredentialStore, StoreError};
use super::types::{CredentialEntry, Identity, Role, UserMetadata};
use crate::storage::{StorageError, UserStorage};
use crate::Secret;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Authentication manager errors
#[derive(Error, Debug)]
pub enum AuthManagerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for auth manager operations
pub type ManagerResult<T> = Result<T, AuthManagerError>;

/// Verifies identities and manages provisioned users
pub struct AuthManager {
    store: CredentialStore,
    hasher: PasswordHasher,
    /// Optional write-through persistence
    storage: Option<Arc<dyn UserStorage>>,
    /// Serializes persist-then-apply sequences
    provisioning: Mutex<()>,
}

impl AuthManager {
    /// Create a manager seeded with the administrator's plaintext secret
    pub fn new(admin_identifier: &str, admin_secret: &Secret, hasher: PasswordHasher) -> ManagerResult<Self> {
        let admin_hash = hasher.hash(admin_secret.expose())?;
        Self::with_admin_hash(admin_identifier, admin_hash, hasher)
    }

    /// Create a manager from an already hashed administrator secret
    ///
    /// The hash must parse as bcrypt. When its cost differs from the
    /// hasher's, the hasher is rebuilt at the admin cost so that every
    /// verification (decoy included) costs the same.
    pub fn with_admin_hash(
        admin_identifier: &str,
        admin_hash: impl Into<String>,
        hasher: PasswordHasher,
    ) -> ManagerResult<Self> {
        let admin_hash = admin_hash.into();
        let admin_cost = hash_cost(&admin_hash)?;

        let hasher = if admin_cost == hasher.cost() {
            hasher
        } else {
            warn!(
                configured = hasher.cost(),
                admin = admin_cost,
                "Admin hash cost differs from hash_cost; hashing at the admin cost"
            );
            PasswordHasher::new(admin_cost)?
        };

        let store = CredentialStore::new(admin_identifier, admin_hash)?;
        Ok(Self {
            store,
            hasher,
            storage: None,
            provisioning: Mutex::new(()),
        })
    }

    /// Attach write-through user storage
    pub fn with_storage(mut self, storage: Arc<dyn UserStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Load provisioned users from storage into the store
    ///
    /// Returns the number of users loaded.
    pub async fn load_users(&self) -> ManagerResult<usize> {
        let Some(storage) = &self.storage else {
            return Ok(0);
        };

        let users = storage.load().await?;
        let count = users.len();
        for entry in users {
            self.store.insert(entry)?;
        }

        info!(count, "Loaded provisioned users");
        Ok(count)
    }

    // ==================== Authentication ====================

    /// Verify an identifier/secret pair
    pub fn authenticate(&self, identifier: &str, secret: &Secret) -> Result<Identity, AuthError> {
        let entry = match self.store.lookup(identifier) {
            Ok(entry) => entry,
            Err(_) => {
                self.hasher.verify_decoy(secret.expose());
                return Err(AuthError::UnknownIdentity);
            }
        };

        if !self.hasher.verify(secret.expose(), &entry.secret_hash) {
            return Err(AuthError::BadSecret);
        }

        Ok(Identity::from(&entry))
    }

    // ==================== User Management ====================

    /// Create or replace a user with a data role
    pub async fn add_user(&self, identifier: &str, secret: &Secret, role: Role) -> ManagerResult<UserMetadata> {
        if secret.is_empty() {
            return Err(AuthManagerError::InvalidRequest(
                "secret must not be empty".to_string(),
            ));
        }
        self.store.validate(identifier, role)?;

        // bcrypt is CPU-bound; keep it off the async workers
        let hasher = self.hasher.clone();
        let plain = secret.clone();
        let secret_hash = tokio::task::spawn_blocking(move || hasher.hash(plain.expose())).await??;
        let entry = CredentialEntry::new(identifier, secret_hash, role);

        let _guard = self.provisioning.lock().await;

        if let Some(storage) = &self.storage {
            let mut users = self.store.export_users();
            users.retain(|u| u.identifier != identifier);
            users.push(entry.clone());
            storage.save(&users).await?;
        }

        let replaced = self.store.insert(entry.clone())?;
        info!(user = %identifier, role = %role, replaced, "User provisioned");

        Ok(UserMetadata::from(&entry))
    }

    /// Remove a user
    ///
    /// Returns whether the user existed; removing an unknown user succeeds.
    pub async fn remove_user(&self, identifier: &str) -> ManagerResult<bool> {
        if identifier.is_empty() {
            return Err(StoreError::InvalidIdentifier.into());
        }
        if identifier == self.store.admin_identifier() {
            return Err(StoreError::RoleViolation(format!(
                "'{}' is the administrator and cannot be removed",
                identifier
            ))
            .into());
        }

        let _guard = self.provisioning.lock().await;

        if !self.store.contains(identifier) {
            debug!(user = %identifier, "Remove requested for unknown user");
            return Ok(false);
        }

        if let Some(storage) = &self.storage {
            let mut users = self.store.export_users();
            users.retain(|u| u.identifier != identifier);
            storage.save(&users).await?;
        }

        let existed = self.store.remove(identifier)?;
        info!(user = %identifier, "User removed");

        Ok(existed)
    }

    /// List all users (metadata only, sorted by identifier)
    pub fn list_users(&self) -> Vec<UserMetadata> {
        let mut users: Vec<UserMetadata> = self.store.list().iter().map(UserMetadata::from).collect();
        users.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        users
    }

    /// Get a reference to the credential store
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }
}
