//! Provisioning endpoints under `/admin`
//!
//! Reached only after the request filter has verified the administrator.
//! Each endpoint takes a single form field `user=identifier:secret`.

use axum::{
    extract::{rejection::FormRejection, Extension, Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::auth::{AuthManagerError, Identity, Role, UserMetadata};
use crate::Secret;

use super::server::AppState;

/// Body of a successful provisioning call
pub const SUCCESS_MARKER: &str = "OK";

/// Admin endpoint errors
#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthManagerError> for AdminError {
    fn from(e: AuthManagerError) -> Self {
        match e {
            AuthManagerError::InvalidRequest(msg) => AdminError::InvalidRequest(msg),
            AuthManagerError::Store(e) => AdminError::InvalidRequest(e.to_string()),
            AuthManagerError::Storage(_) | AuthManagerError::Hash(_) | AuthManagerError::Task(_) => {
                AdminError::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        match self {
            AdminError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AdminError::Internal(msg) => {
                error!(error = %msg, "Provisioning failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

/// Form body shared by every provisioning endpoint
#[derive(Debug, Deserialize)]
pub struct UserForm {
    pub user: Option<String>,
}

/// Split the `user` field into identifier and secret on the first colon
pub fn parse_user_field(raw: &str) -> Result<(String, Secret), AdminError> {
    let (identifier, secret) = raw.split_once(':').ok_or_else(|| {
        AdminError::InvalidRequest("user must look like identifier:secret".to_string())
    })?;

    if identifier.is_empty() {
        return Err(AdminError::InvalidRequest(
            "identifier must not be empty".to_string(),
        ));
    }

    Ok((identifier.to_string(), Secret::new(secret)))
}

fn user_field(form: Result<Form<UserForm>, FormRejection>) -> Result<(String, Secret), AdminError> {
    let Form(form) = form.map_err(|e| AdminError::InvalidRequest(e.body_text()))?;
    let raw = form
        .user
        .ok_or_else(|| AdminError::InvalidRequest("missing form field 'user'".to_string()))?;
    parse_user_field(&raw)
}

async fn add_user(
    state: &AppState,
    admin: &Identity,
    form: Result<Form<UserForm>, FormRejection>,
    role: Role,
) -> Result<&'static str, AdminError> {
    let (identifier, secret) = user_field(form)?;
    state
        .auth_manager
        .add_user(&identifier, &secret, role)
        .await?;

    info!(admin = %admin.identifier, user = %identifier, role = %role, "add-user completed");
    Ok(SUCCESS_MARKER)
}

/// POST /admin/add-user-ro
pub async fn add_user_ro(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    form: Result<Form<UserForm>, FormRejection>,
) -> Result<&'static str, AdminError> {
    add_user(&state, &admin, form, Role::ReadOnly).await
}

/// POST /admin/add-user-rw
pub async fn add_user_rw(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    form: Result<Form<UserForm>, FormRejection>,
) -> Result<&'static str, AdminError> {
    add_user(&state, &admin, form, Role::ReadWrite).await
}

/// POST /admin/remove-user
///
/// The secret half of the field is accepted but unused.
pub async fn remove_user(
    State(state): State<AppState>,
    Extension(admin): Extension<Identity>,
    form: Result<Form<UserForm>, FormRejection>,
) -> Result<&'static str, AdminError> {
    let (identifier, _) = user_field(form)?;
    let existed = state.auth_manager.remove_user(&identifier).await?;

    info!(admin = %admin.identifier, user = %identifier, existed, "remove-user completed");
    Ok(SUCCESS_MARKER)
}

/// GET /admin/list-users
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<UserMetadata>> {
    Json(state.auth_manager.list_users())
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Routes for the admin path class
///
/// Unknown admin paths answer 404 rather than falling through to the
/// upstream.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/add-user-ro", post(add_user_ro))
        .route("/admin/add-user-rw", post(add_user_rw))
        .route("/admin/remove-user", post(remove_user))
        .route("/admin/list-users", get(list_users))
        .route("/admin", any(not_found))
        .route("/admin/{*rest}", any(not_found))
}
