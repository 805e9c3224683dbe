//! Gateway server implementation using Axum

use crate::auth::{AccessGate, AuthManager, PathClass};
use axum::{
    extract::{FromRef, OriginalUri, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{admin, filter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_manager: Arc<AuthManager>,
    pub gate: Arc<AccessGate>,
    /// Realm advertised in the Basic challenge
    pub realm: Arc<str>,
}

impl AppState {
    pub fn new(auth_manager: Arc<AuthManager>, gate: AccessGate, realm: &str) -> Self {
        Self {
            auth_manager,
            gate: Arc::new(gate),
            realm: Arc::from(realm),
        }
    }
}

impl FromRef<AppState> for Arc<AuthManager> {
    fn from_ref(state: &AppState) -> Self {
        state.auth_manager.clone()
    }
}

impl FromRef<AppState> for Arc<AccessGate> {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

/// Keep admin-class paths the admin router did not match away from `data`
async fn data_paths_only(request: Request, next: Next) -> Response {
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    match PathClass::classify(&path) {
        PathClass::Admin => StatusCode::NOT_FOUND.into_response(),
        PathClass::Data => next.run(request).await,
    }
}

/// Assemble the full router
///
/// Admin endpoints are served locally; every other path goes to `data`.
/// The auth filter wraps both, so nothing is reachable without credentials.
pub fn build_router(state: AppState, data: Router) -> Router {
    let data = data.layer(middleware::from_fn(data_paths_only));

    Router::new()
        .merge(admin::admin_routes())
        .fallback_service(data)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            filter::require_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The authenticating gateway
pub struct GatewayServer {
    bind: String,
    state: AppState,
}

impl GatewayServer {
    /// Create a new gateway server
    pub fn new(bind: impl Into<String>, state: AppState) -> Self {
        Self {
            bind: bind.into(),
            state,
        }
    }

    /// Build the router with `data` as the handler for data paths
    pub fn router(&self, data: Router) -> Router {
        build_router(self.state.clone(), data)
    }

    /// Run the gateway until the listener fails
    pub async fn run(self, data: Router) -> std::io::Result<()> {
        let router = self.router(data);
        let listener = tokio::net::TcpListener::bind(&self.bind).await?;

        info!(
            bind = %self.bind,
            realm = %self.state.realm,
            users = self.state.auth_manager.store().len(),
            "Starting Vestibule gateway"
        );

        axum::serve(listener, router).await
    }
}
