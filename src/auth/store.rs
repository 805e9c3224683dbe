//! In-memory credential store
//!
//! Entries live in a fixed set of lock stripes keyed by identifier hash, so
//! operations on one identifier are serialized while unrelated identifiers
//! can be read and written concurrently. The administrator entry is held
//! outside the stripes and never changes after construction.

use super::types::{CredentialEntry, Role};
use parking_lot::RwLock;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use thiserror::Error;

/// Number of lock stripes
const STRIPE_COUNT: usize = 16;

/// Credential store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Identifier must not be empty")]
    InvalidIdentifier,

    #[error("Role violation: {0}")]
    RoleViolation(String),

    #[error("Identifier not found: {0}")]
    NotFound(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Owns every credential entry
pub struct CredentialStore {
    /// The bootstrap administrator
    admin: CredentialEntry,
    /// Provisioned users, striped by identifier hash
    stripes: Vec<RwLock<HashMap<String, CredentialEntry>>>,
    /// Hasher used to pick a stripe
    hash_builder: RandomState,
}

impl CredentialStore {
    /// Create a store seeded with the administrator entry
    pub fn new(admin_identifier: impl Into<String>, admin_hash: impl Into<String>) -> StoreResult<Self> {
        let admin_identifier = admin_identifier.into();
        if admin_identifier.is_empty() {
            return Err(StoreError::InvalidIdentifier);
        }

        Ok(Self {
            admin: CredentialEntry::new(admin_identifier, admin_hash, Role::Admin),
            stripes: (0..STRIPE_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
            hash_builder: RandomState::new(),
        })
    }

    fn stripe(&self, identifier: &str) -> &RwLock<HashMap<String, CredentialEntry>> {
        let index = self.hash_builder.hash_one(identifier) as usize % STRIPE_COUNT;
        &self.stripes[index]
    }

    /// Identifier of the administrator entry
    pub fn admin_identifier(&self) -> &str {
        &self.admin.identifier
    }

    /// Check that `identifier` may be written with `role`
    pub fn validate(&self, identifier: &str, role: Role) -> StoreResult<()> {
        if identifier.is_empty() {
            return Err(StoreError::InvalidIdentifier);
        }
        if role.is_admin() {
            return Err(StoreError::RoleViolation(
                "the admin role cannot be assigned".to_string(),
            ));
        }
        self.check_not_admin(identifier)
    }

    fn check_not_admin(&self, identifier: &str) -> StoreResult<()> {
        if identifier == self.admin.identifier {
            return Err(StoreError::RoleViolation(format!(
                "'{}' is the administrator and cannot be modified",
                identifier
            )));
        }
        Ok(())
    }

    /// Insert or replace an entry
    ///
    /// Returns `true` when an existing entry was replaced.
    pub fn put(
        &self,
        identifier: impl Into<String>,
        secret_hash: impl Into<String>,
        role: Role,
    ) -> StoreResult<bool> {
        self.insert(CredentialEntry::new(identifier, secret_hash, role))
    }

    /// Insert or replace a prepared entry (used when loading from storage)
    pub fn insert(&self, entry: CredentialEntry) -> StoreResult<bool> {
        self.validate(&entry.identifier, entry.role)?;

        let mut stripe = self.stripe(&entry.identifier).write();
        Ok(stripe.insert(entry.identifier.clone(), entry).is_some())
    }

    /// Remove an entry
    ///
    /// Removing an absent identifier is not an error; returns whether an
    /// entry existed.
    pub fn remove(&self, identifier: &str) -> StoreResult<bool> {
        if identifier.is_empty() {
            return Err(StoreError::InvalidIdentifier);
        }
        self.check_not_admin(identifier)?;

        let mut stripe = self.stripe(identifier).write();
        Ok(stripe.remove(identifier).is_some())
    }

    /// Look up an entry by identifier
    pub fn lookup(&self, identifier: &str) -> StoreResult<CredentialEntry> {
        if identifier == self.admin.identifier {
            return Ok(self.admin.clone());
        }

        let stripe = self.stripe(identifier).read();
        stripe
            .get(identifier)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(identifier.to_string()))
    }

    /// Check whether an identifier is present
    pub fn contains(&self, identifier: &str) -> bool {
        identifier == self.admin.identifier || self.stripe(identifier).read().contains_key(identifier)
    }

    /// All entries including the administrator
    pub fn list(&self) -> Vec<CredentialEntry> {
        let mut entries = vec![self.admin.clone()];
        entries.extend(self.export_users());
        entries
    }

    /// Provisioned (non-admin) entries, for persistence
    pub fn export_users(&self) -> Vec<CredentialEntry> {
        self.stripes
            .iter()
            .flat_map(|stripe| stripe.read().values().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Number of entries including the administrator
    pub fn len(&self) -> usize {
        1 + self.stripes.iter().map(|s| s.read().len()).sum::<usize>()
    }

    /// A store always holds its administrator
    pub fn is_empty(&self) -> bool {
        false
    }
}
