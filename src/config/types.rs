//! Raw configuration types for TOML parsing

use super::*;
use crate::auth::{MAX_HASH_COST, MIN_HASH_COST};
use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
#[derive(Debug, Deserialize, Serialize)]
pub struct RawConfig {
    pub server: Option<RawServerConfig>,
    pub admin: Option<RawAdminConfig>,
    pub upstream: Option<RawUpstreamConfig>,
    pub storage: Option<RawStorageConfig>,
    pub security: Option<RawSecurityConfig>,
    pub logging: Option<RawLoggingConfig>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct RawServerConfig {
    pub bind: Option<String>,
    pub realm: Option<String>,
}

impl From<RawServerConfig> for ServerConfig {
    fn from(raw: RawServerConfig) -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind: raw.bind.unwrap_or(defaults.bind),
            realm: raw.realm.unwrap_or(defaults.realm),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct RawAdminConfig {
    /// `identifier:secret`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub data_role: Option<String>,
}

impl TryFrom<RawAdminConfig> for AdminConfig {
    type Error = ConfigError;

    fn try_from(raw: RawAdminConfig) -> Result<Self, Self::Error> {
        let credentials = match (raw.credentials, raw.username, raw.password_hash) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ConfigError::Invalid(
                    "use either admin.credentials or admin.username/password_hash, not both"
                        .to_string(),
                ))
            }
            (Some(pair), None, None) => {
                let (identifier, secret) = parse_credentials(&pair)?;
                Some(AdminCredentials::Plain { identifier, secret })
            }
            (None, Some(identifier), Some(password_hash)) => {
                if identifier.is_empty() {
                    return Err(ConfigError::Invalid(
                        "admin identifier must not be empty".to_string(),
                    ));
                }
                Some(AdminCredentials::Hashed {
                    identifier,
                    password_hash,
                })
            }
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(ConfigError::Invalid(
                    "admin.username and admin.password_hash must be set together".to_string(),
                ))
            }
            (None, None, None) => None,
        };

        let data_role = match raw.data_role.as_deref() {
            None | Some("none") => None,
            Some(name) => match Role::from_str(name) {
                Some(role) if !role.is_admin() => Some(role),
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "Unknown admin data role: {}",
                        name
                    )))
                }
            },
        };

        Ok(Self {
            credentials,
            data_role,
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct RawUpstreamConfig {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_body_bytes: Option<usize>,
}

impl From<RawUpstreamConfig> for UpstreamConfig {
    fn from(raw: RawUpstreamConfig) -> Self {
        let defaults = UpstreamConfig::default();
        Self {
            url: raw.url.map(|u| u.trim_end_matches('/').to_string()),
            timeout_secs: raw.timeout_secs.unwrap_or(defaults.timeout_secs),
            max_body_bytes: raw.max_body_bytes.unwrap_or(defaults.max_body_bytes),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct RawStorageConfig {
    pub path: Option<String>,
}

impl From<RawStorageConfig> for StorageConfig {
    fn from(raw: RawStorageConfig) -> Self {
        Self {
            path: raw.path.map(|p| expand_home(&p)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct RawSecurityConfig {
    pub hash_cost: Option<u32>,
}

impl TryFrom<RawSecurityConfig> for SecurityConfig {
    type Error = ConfigError;

    fn try_from(raw: RawSecurityConfig) -> Result<Self, Self::Error> {
        let hash_cost = raw.hash_cost.unwrap_or(DEFAULT_HASH_COST);
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&hash_cost) {
            return Err(ConfigError::Invalid(format!(
                "hash_cost must be between {} and {}",
                MIN_HASH_COST, MAX_HASH_COST
            )));
        }
        Ok(Self { hash_cost })
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct RawLoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl From<RawLoggingConfig> for LoggingConfig {
    fn from(raw: RawLoggingConfig) -> Self {
        Self {
            level: raw.level.unwrap_or_else(|| "info".to_string()),
            format: match raw.format.as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        }
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
