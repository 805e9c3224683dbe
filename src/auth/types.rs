//! Role model and credential types
//!
//! Provides:
//! - Role enum with the HTTP methods each tier permits on data paths
//! - CredentialEntry, the stored record binding an identifier to a hash
//! - Identity, the verified result of authentication

use axum::http::Method;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capability tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Provisions users through the admin endpoints
    Admin,
    /// Read access to data paths
    ReadOnly,
    /// Read and write access to data paths
    ReadWrite,
}

impl Role {
    /// Parse a role from string
    ///
    /// Accepts the canonical names plus the short forms used by the
    /// provisioning endpoints (`ro`, `rw`).
    pub fn from_str(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "read_only" | "read-only" | "ro" => Some(Role::ReadOnly),
            "read_write" | "read-write" | "rw" => Some(Role::ReadWrite),
            _ => None,
        }
    }

    /// Whether this role may use `method` against a data path
    pub fn permits(&self, method: &Method) -> bool {
        match self {
            Role::Admin => false,
            Role::ReadOnly => is_read_method(method),
            Role::ReadWrite => is_read_method(method) || is_write_method(method),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

fn is_read_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn is_write_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    )
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::ReadOnly => write!(f, "read_only"),
            Role::ReadWrite => write!(f, "read_write"),
        }
    }
}

/// A stored credential record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialEntry {
    /// Username, case-sensitive and non-empty
    pub identifier: String,
    /// Bcrypt hash of the secret (salt embedded)
    pub secret_hash: String,
    /// Capability tier
    pub role: Role,
    /// When this entry was provisioned
    pub created_at: DateTime<Utc>,
}

impl CredentialEntry {
    /// Create a new entry stamped with the current time
    pub fn new(identifier: impl Into<String>, secret_hash: impl Into<String>, role: Role) -> Self {
        Self {
            identifier: identifier.into(),
            secret_hash: secret_hash.into(),
            role,
            created_at: Utc::now(),
        }
    }
}

/// Metadata for a user (safe for display, excludes hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    pub identifier: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&CredentialEntry> for UserMetadata {
    fn from(entry: &CredentialEntry) -> Self {
        Self {
            identifier: entry.identifier.clone(),
            role: entry.role,
            created_at: entry.created_at,
        }
    }
}

/// A verified identity, valid for the duration of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub identifier: String,
    pub role: Role,
}

impl Identity {
    pub fn new(identifier: impl Into<String>, role: Role) -> Self {
        Self {
            identifier: identifier.into(),
            role,
        }
    }
}

impl From<&CredentialEntry> for Identity {
    fn from(entry: &CredentialEntry) -> Self {
        Self::new(entry.identifier.clone(), entry.role)
    }
}
