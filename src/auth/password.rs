//! Salted password hashing with bcrypt

use bcrypt::{hash, verify, BcryptError, HashParts, DEFAULT_COST};

/// Default bcrypt cost for production use
pub const DEFAULT_HASH_COST: u32 = DEFAULT_COST;
/// Lowest cost bcrypt accepts
pub const MIN_HASH_COST: u32 = 4;
/// Highest cost bcrypt accepts
pub const MAX_HASH_COST: u32 = 31;

/// Plaintext behind the decoy hash; never matches a real lookup
const DECOY_SECRET: &str = "vestibule-decoy-secret";

/// Hashes and verifies secrets
///
/// Holds a decoy hash at the same cost so that a lookup miss costs as much
/// as a real verification.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    decoy_hash: String,
}

impl PasswordHasher {
    /// Create a hasher with the given bcrypt cost
    pub fn new(cost: u32) -> Result<Self, BcryptError> {
        let decoy_hash = hash(DECOY_SECRET, cost)?;
        Ok(Self { cost, decoy_hash })
    }

    /// Hash a secret with a fresh random salt
    pub fn hash(&self, secret: &str) -> Result<String, BcryptError> {
        hash(secret, self.cost)
    }

    /// Verify a secret against a stored hash
    ///
    /// A malformed stored hash never verifies.
    pub fn verify(&self, secret: &str, secret_hash: &str) -> bool {
        verify(secret, secret_hash).unwrap_or(false)
    }

    /// Burn one verification against the decoy hash
    pub fn verify_decoy(&self, secret: &str) {
        let _ = verify(secret, &self.decoy_hash);
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

/// Parse a stored bcrypt hash and return its cost
pub fn hash_cost(secret_hash: &str) -> Result<u32, BcryptError> {
    let parts: HashParts = secret_hash.parse()?;
    Ok(parts.get_cost())
}
