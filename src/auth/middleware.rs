//! Authentication helpers for request validation
//!
//! Provides functions for:
//! - Extracting Basic credentials from the Authorization header
//! - Verifying them against the auth manager
//! - Checking the verified identity against the gate

use super::gate::{AccessGate, Decision, PathClass};
use super::manager::AuthManager;
use super::types::Identity;
use crate::Secret;
use axum::http::Method;
use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

/// Authentication and authorization failures
///
/// Every variant is reported to the client as the same 401 challenge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing authentication: Authorization header required")]
    MissingCredentials,

    #[error("Malformed Basic credentials")]
    MalformedCredentials,

    #[error("Unknown identity")]
    UnknownIdentity,

    #[error("Bad secret")]
    BadSecret,

    #[error("Insufficient role")]
    InsufficientRole,
}

/// Identifier and secret presented by a client
#[derive(Debug)]
pub struct BasicCredentials {
    pub identifier: String,
    pub secret: Secret,
}

/// Extract Basic credentials from an Authorization header
///
/// Expected format: `Authorization: Basic base64(identifier:secret)`
pub fn extract_basic_credentials(auth_header: Option<&str>) -> Result<BasicCredentials, AuthError> {
    let header = auth_header.ok_or(AuthError::MissingCredentials)?;

    let (scheme, encoded) = header
        .split_once(' ')
        .ok_or(AuthError::MalformedCredentials)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::MalformedCredentials);
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthError::MalformedCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedCredentials)?;

    // The secret may itself contain colons
    let (identifier, secret) = decoded
        .split_once(':')
        .ok_or(AuthError::MalformedCredentials)?;
    if identifier.is_empty() {
        return Err(AuthError::MalformedCredentials);
    }

    Ok(BasicCredentials {
        identifier: identifier.to_string(),
        secret: Secret::new(secret),
    })
}

/// Full authentication flow: extract credentials from header and verify
pub fn authenticate(auth_manager: &AuthManager, auth_header: Option<&str>) -> Result<Identity, AuthError> {
    let credentials = extract_basic_credentials(auth_header)?;
    auth_manager.authenticate(&credentials.identifier, &credentials.secret)
}

/// Check a verified identity against the gate
pub fn authorize(
    gate: &AccessGate,
    identity: &Identity,
    method: &Method,
    class: PathClass,
) -> Result<(), AuthError> {
    match gate.authorize_class(identity, method, class) {
        Decision::Allow => Ok(()),
        Decision::Deny => Err(AuthError::InsufficientRole),
    }
}
