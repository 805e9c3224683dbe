//! HTTP surface of the gateway
//!
//! - `filter`: authentication and authorization for every request
//! - `admin`: user provisioning endpoints under `/admin`
//! - `proxy`: forwarding of allowed data requests upstream

mod admin;
mod filter;
mod proxy;
mod server;

pub use admin::{admin_routes, parse_user_field, AdminError, UserForm, SUCCESS_MARKER};
pub use filter::{require_auth, unauthorized_response};
pub use proxy::UpstreamProxy;
pub use server::{build_router, AppState, GatewayServer};
