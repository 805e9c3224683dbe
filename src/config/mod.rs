//! Configuration system for Vestibule
//!
//! Loads configuration from TOML files and environment variables.

mod types;

pub use types::*;

use crate::auth::{Role, DEFAULT_HASH_COST};
use crate::Secret;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Environment variable overriding `[admin] credentials`
pub const CREDENTIALS_ENV: &str = "VESTIBULE_CREDENTIALS";

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main Vestibule configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Bootstrap administrator
    pub admin: AdminConfig,
    /// Upstream graph server
    pub upstream: UpstreamConfig,
    /// User file configuration
    pub storage: StorageConfig,
    /// Password hashing
    pub security: SecurityConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load configuration from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Self::from_raw(raw)
    }

    /// Convert from raw TOML config to validated config
    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            server: raw.server.unwrap_or_default().into(),
            admin: raw.admin.unwrap_or_default().try_into()?,
            upstream: raw.upstream.unwrap_or_default().into(),
            storage: raw.storage.unwrap_or_default().into(),
            security: raw.security.unwrap_or_default().try_into()?,
            logging: raw.logging.unwrap_or_default().into(),
        })
    }

    /// Replace the admin credentials with an `identifier:secret` pair
    pub fn with_credentials(mut self, raw: &str) -> Result<Self, ConfigError> {
        let (identifier, secret) = parse_credentials(raw)?;
        self.admin.credentials = Some(AdminCredentials::Plain { identifier, secret });
        Ok(self)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        match std::env::var(CREDENTIALS_ENV) {
            Ok(raw) => self.with_credentials(&raw),
            Err(_) => Ok(self),
        }
    }

    /// The admin credentials, which `serve` cannot start without
    pub fn admin_credentials(&self) -> Result<&AdminCredentials, ConfigError> {
        self.admin.credentials.as_ref().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "admin credentials not configured; set [admin] credentials or {}",
                CREDENTIALS_ENV
            ))
        })
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            admin: AdminConfig::default(),
            upstream: UpstreamConfig::default(),
            storage: StorageConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Render a starter configuration with a pre-hashed administrator
    pub fn starter_toml(
        identifier: &str,
        password_hash: &str,
        users_path: &Path,
    ) -> Result<String, ConfigError> {
        if identifier.is_empty() || identifier.contains(':') {
            return Err(ConfigError::Invalid(
                "admin identifier must be non-empty and free of ':'".to_string(),
            ));
        }

        let defaults = Self::default_config();
        let raw = RawConfig {
            server: Some(RawServerConfig {
                bind: Some(defaults.server.bind),
                realm: Some(defaults.server.realm),
            }),
            admin: Some(RawAdminConfig {
                credentials: None,
                username: Some(identifier.to_string()),
                password_hash: Some(password_hash.to_string()),
                data_role: Some("none".to_string()),
            }),
            upstream: Some(RawUpstreamConfig {
                url: Some("http://127.0.0.1:7475".to_string()),
                timeout_secs: Some(defaults.upstream.timeout_secs),
                max_body_bytes: None,
            }),
            storage: Some(RawStorageConfig {
                path: Some(users_path.to_string_lossy().into_owned()),
            }),
            security: Some(RawSecurityConfig {
                hash_cost: Some(defaults.security.hash_cost),
            }),
            logging: Some(RawLoggingConfig {
                level: Some(defaults.logging.level),
                format: Some("pretty".to_string()),
            }),
        };

        let body = toml::to_string(&raw).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(format!("# Vestibule Configuration\n\n{}", body))
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vestibule")
            .join("config.toml")
    }

    /// Get the default user file path
    pub fn default_users_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vestibule")
            .join("users.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Split an `identifier:secret` pair on the first colon
pub fn parse_credentials(raw: &str) -> Result<(String, Secret), ConfigError> {
    let (identifier, secret) = raw
        .split_once(':')
        .ok_or_else(|| ConfigError::Invalid("credentials must look like identifier:secret".to_string()))?;

    if identifier.is_empty() {
        return Err(ConfigError::Invalid("admin identifier must not be empty".to_string()));
    }

    Ok((identifier.to_string(), Secret::new(secret)))
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Realm advertised in the Basic challenge
    pub realm: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7474".to_string(),
            realm: "vestibule".to_string(),
        }
    }
}

/// Bootstrap administrator configuration
#[derive(Debug, Clone, Default)]
pub struct AdminConfig {
    pub credentials: Option<AdminCredentials>,
    /// Data tier granted to the administrator (none by default)
    pub data_role: Option<Role>,
}

/// How the administrator secret is supplied
#[derive(Debug, Clone)]
pub enum AdminCredentials {
    /// Plaintext secret, hashed at startup
    Plain { identifier: String, secret: Secret },
    /// Pre-computed bcrypt hash
    Hashed { identifier: String, password_hash: String },
}

impl AdminCredentials {
    pub fn identifier(&self) -> &str {
        match self {
            AdminCredentials::Plain { identifier, .. } => identifier,
            AdminCredentials::Hashed { identifier, .. } => identifier,
        }
    }
}

/// Upstream graph server configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL requests are forwarded to
    pub url: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Largest request body forwarded
    pub max_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 30,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// User file configuration
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Where provisioned users are persisted; `None` keeps them in memory
    pub path: Option<PathBuf>,
}

/// Password hashing configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// bcrypt cost
    pub hash_cost: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            hash_cost: DEFAULT_HASH_COST,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Format: "json" or "pretty"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format
    Pretty,
    /// JSON format
    Json,
}
