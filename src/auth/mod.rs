//! Authentication and authorization for Vestibule
//!
//! Provides role-based access control over HTTP Basic credentials:
//! - A striped in-memory credential store seeded with one administrator
//! - Read-only and read-write data tiers
//! - A gate that splits admin paths from data paths

mod gate;
mod manager;
mod middleware;
mod password;
mod store;
mod types;

pub use gate::{AccessGate, Decision, PathClass, ADMIN_PREFIX};
pub use manager::{AuthManager, AuthManagerError, ManagerResult};
pub use middleware::{authenticate, authorize, extract_basic_credentials, AuthError, BasicCredentials};
pub use password::{hash_cost, PasswordHasher, DEFAULT_HASH_COST, MAX_HASH_COST, MIN_HASH_COST};
pub use store::{CredentialStore, StoreError, StoreResult};
pub use types::{CredentialEntry, Identity, Role, UserMetadata};
