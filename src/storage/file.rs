//! JSON file storage backend
//!
//! Stores provisioned users (hashes only) in a JSON file on disk.

use super::{StorageError, UserStorage};
use crate::auth::CredentialEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Current on-disk format version
const FILE_VERSION: u32 = 1;

/// On-disk format for the user file
#[derive(Debug, Serialize, Deserialize)]
struct UserFile {
    /// Version for future migrations
    version: u32,
    #[serde(default)]
    users: Vec<CredentialEntry>,
}

/// File-based user storage
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage, creating the parent directory if needed
    ///
    /// The file itself is created on the first save.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        Ok(Self { path })
    }

    /// Path of the user file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reject files with duplicate, empty or admin-role entries
fn validate_entries(users: &[CredentialEntry]) -> Result<(), StorageError> {
    let mut seen = HashSet::new();
    for user in users {
        if user.identifier.is_empty() {
            return Err(StorageError::InvalidEntry("empty identifier".to_string()));
        }
        if user.role.is_admin() {
            return Err(StorageError::InvalidEntry(format!(
                "'{}' has the admin role",
                user.identifier
            )));
        }
        if !seen.insert(user.identifier.as_str()) {
            return Err(StorageError::InvalidEntry(format!(
                "duplicate identifier '{}'",
                user.identifier
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl UserStorage for FileStorage {
    async fn load(&self) -> Result<Vec<CredentialEntry>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let file: UserFile =
            serde_json::from_str(&content).map_err(|e| StorageError::Serialization(e.to_string()))?;

        if file.version > FILE_VERSION {
            return Err(StorageError::Serialization(format!(
                "unsupported user file version {}",
                file.version
            )));
        }

        validate_entries(&file.users)?;
        Ok(file.users)
    }

    async fn save(&self, users: &[CredentialEntry]) -> Result<(), StorageError> {
        validate_entries(users)?;

        let mut users = users.to_vec();
        users.sort_by(|a, b| a.identifier.cmp(&b.identifier));

        let file = UserFile {
            version: FILE_VERSION,
            users,
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        // Write atomically by writing to temp file first
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &content).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        fs::rename(&temp_path, &self.path).await?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => Err(
                StorageError::Unavailable(format!("directory {} does not exist", parent.display())),
            ),
            _ => Ok(()),
        }
    }
}
