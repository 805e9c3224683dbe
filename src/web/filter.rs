//! Request filter applied to every inbound request
//!
//! Extracts Basic credentials, authenticates them, authorizes the method
//! against the path class and either forwards the request or answers with a
//! uniform 401 challenge.

use axum::{
    extract::{OriginalUri, Request, State},
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use crate::auth::{authenticate, authorize, PathClass};

use super::server::AppState;

/// Authentication and authorization middleware
///
/// On success the verified [`crate::auth::Identity`] is inserted into the
/// request extensions.
pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    // Nested routers see a stripped URI; classify on what the client sent
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let method = request.method().clone();
    let class = PathClass::classify(&path);

    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    // bcrypt verification blocks; run it on the blocking pool
    let manager = state.auth_manager.clone();
    let authenticated =
        match tokio::task::spawn_blocking(move || authenticate(&manager, auth_header.as_deref())).await {
            Ok(result) => result,
            Err(e) => {
                error!(method = %method, path = %path, error = %e, "Credential check aborted");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
            }
        };

    let outcome = authenticated.and_then(|identity| {
        authorize(&state.gate, &identity, &method, class)?;
        Ok(identity)
    });

    match outcome {
        Ok(identity) => {
            debug!(
                user = %identity.identifier,
                role = %identity.role,
                method = %method,
                path = %path,
                "Request allowed"
            );
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(reason) => {
            warn!(method = %method, path = %path, reason = %reason, "Request rejected");
            unauthorized_response(&state.realm)
        }
    }
}

/// The single response used for every authentication or authorization failure
pub fn unauthorized_response(realm: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", realm))],
        "Unauthorized",
    )
        .into_response()
}
