//! Storage backends for provisioned users
//!
//! Only bcrypt hashes are persisted; the administrator entry comes from
//! configuration and is never written.

mod file;

pub use file::FileStorage;

use crate::auth::CredentialEntry;
use async_trait::async_trait;
use thiserror::Error;

/// Storage-related errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid user entry: {0}")]
    InvalidEntry(String),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

/// Trait for user storage backends
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Load every persisted user
    async fn load(&self) -> Result<Vec<CredentialEntry>, StorageError>;

    /// Replace the persisted user set
    async fn save(&self, users: &[CredentialEntry]) -> Result<(), StorageError>;

    /// Check if the storage backend is available and healthy
    async fn health_check(&self) -> Result<(), StorageError>;
}
