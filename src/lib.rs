//! Vestibule - role-based HTTP Basic authentication for graph database servers
//!
//! Vestibule sits in front of a graph server's REST API and gates every
//! request behind HTTP Basic credentials. A single administrator, seeded from
//! configuration, provisions users with one of two data tiers:
//! - read-only users may `GET`, `HEAD` and `OPTIONS` data paths
//! - read-write users may additionally `POST`, `PUT`, `DELETE` and `PATCH`
//!
//! Allowed data requests are forwarded to the upstream server verbatim.

pub mod auth;
pub mod config;
pub mod storage;
pub mod web;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Core error types for Vestibule
#[derive(Error, Debug)]
pub enum VestibuleError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Authentication setup failed: {0}")]
    Auth(#[from] auth::AuthManagerError),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Upstream client error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// A secret string that never shows up in `Debug` output
#[derive(Debug, Clone)]
pub struct Secret(SecretString);

impl Secret {
    /// Create a new secret from a string
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Expose the secret value
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Whether the secret is the empty string
    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
