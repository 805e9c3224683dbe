//! Authorization gate
//!
//! Classifies a request path once and decides whether a verified identity
//! may use the request method against it.

use super::types::{Identity, Role};
use axum::http::Method;

/// Reserved prefix for provisioning endpoints
pub const ADMIN_PREFIX: &str = "/admin";

/// Which side of the gateway a path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// `/admin` and everything below it
    Admin,
    /// Everything else, including `/`
    Data,
}

impl PathClass {
    pub fn classify(path: &str) -> Self {
        match path.strip_prefix(ADMIN_PREFIX) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => PathClass::Admin,
            _ => PathClass::Data,
        }
    }
}

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// Decides ALLOW/DENY for verified identities
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    /// Data tier granted to the administrator; `None` keeps admins off data paths
    admin_data_role: Option<Role>,
}

impl AccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant the administrator a data tier
    ///
    /// `Role::Admin` grants nothing, since admin has no data methods.
    pub fn with_admin_data_role(mut self, role: Option<Role>) -> Self {
        self.admin_data_role = role;
        self
    }

    /// Authorize a request by raw path
    pub fn authorize(&self, identity: &Identity, method: &Method, path: &str) -> Decision {
        self.authorize_class(identity, method, PathClass::classify(path))
    }

    /// Authorize a request whose path has already been classified
    pub fn authorize_class(&self, identity: &Identity, method: &Method, class: PathClass) -> Decision {
        let allowed = match class {
            PathClass::Admin => identity.role.is_admin(),
            PathClass::Data => {
                let data_role = match identity.role {
                    Role::Admin => self.admin_data_role,
                    role => Some(role),
                };
                data_role.is_some_and(|role| role.permits(method))
            }
        };

        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}
