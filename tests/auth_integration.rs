//! Integration tests for the gateway
//!
//! Drives the full router (filter -> admin handlers / data passthrough) with
//! in-process requests.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tower::ServiceExt;
use vestibule::auth::{AccessGate, AuthManager, PasswordHasher, Role, UserMetadata};
use vestibule::storage::FileStorage;
use vestibule::web::{build_router, AppState, UpstreamProxy};
use vestibule::Secret;

// ============================================================================
// Test Helpers
// ============================================================================

const ADMIN: &str = "neo4j:master";

fn test_manager() -> AuthManager {
    let hasher = PasswordHasher::new(4).unwrap();
    AuthManager::new("neo4j", &Secret::new("master"), hasher).unwrap()
}

/// Stand-in for the graph server: 201 for POST, 200 otherwise
async fn fake_graph(method: Method) -> impl IntoResponse {
    if method == Method::POST {
        (StatusCode::CREATED, "created")
    } else {
        (StatusCode::OK, "data")
    }
}

fn fake_data_router() -> Router {
    Router::new().fallback(fake_graph)
}

fn gateway(manager: AuthManager, gate: AccessGate) -> Router {
    let state = AppState::new(Arc::new(manager), gate, "graph");
    build_router(state, fake_data_router())
}

fn basic(credentials: &str) -> String {
    format!("Basic {}", STANDARD.encode(credentials))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    credentials: Option<&str>,
    form: Option<&str>,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(credentials) = credentials {
        builder = builder.header(header::AUTHORIZATION, basic(credentials));
    }

    let body = match form {
        Some(form) => {
            builder = builder.header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
            Body::from(form.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

async fn admin_post(app: &Router, endpoint: &str, user: &str) -> (StatusCode, String) {
    send(
        app,
        Method::POST,
        &format!("/admin/{}", endpoint),
        Some(ADMIN),
        Some(&format!("user={}", user)),
    )
    .await
}

// ============================================================================
// Tests
// ============================================================================

/// Every path challenges a request without credentials
#[tokio::test]
async fn test_unauthenticated_requests_are_challenged() {
    let app = gateway(test_manager(), AccessGate::new());

    for (method, path) in [
        (Method::GET, "/"),
        (Method::GET, "/db/data"),
        (Method::POST, "/db/data/node"),
        (Method::POST, "/admin/add-user-ro"),
        (Method::GET, "/admin/list-users"),
        (Method::GET, "/admin/nope"),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method.clone())
                    .uri(path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, path);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"graph\""
        );
    }
}

/// Wrong secret, unknown user and garbage headers all look the same
#[tokio::test]
async fn test_failures_are_indistinguishable() {
    let app = gateway(test_manager(), AccessGate::new());
    admin_post(&app, "add-user-ro", "test:pass").await;

    let bad_secret = send(&app, Method::GET, "/db/data", Some("test:wrong"), None).await;
    let unknown = send(&app, Method::GET, "/db/data", Some("ghost:pass"), None).await;
    let forbidden = send(&app, Method::POST, "/db/data", Some("test:pass"), None).await;

    assert_eq!(bad_secret.0, StatusCode::UNAUTHORIZED);
    assert_eq!(bad_secret, unknown);
    assert_eq!(bad_secret, forbidden);

    let garbage = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/db/data")
                .header(header::AUTHORIZATION, "Basic !!!not-base64")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_read_only_user_lifecycle() {
    let app = gateway(test_manager(), AccessGate::new());

    let (status, body) = admin_post(&app, "add-user-ro", "test:pass").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let (status, _) = send(&app, Method::GET, "/", Some("test:pass"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::HEAD, "/db/data", Some("test:pass"), None).await;
    assert_eq!(status, StatusCode::OK);

    for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
        let (status, _) = send(&app, method, "/db/data/node", Some("test:pass"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = admin_post(&app, "remove-user", "test:pass").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");

    let (status, _) = send(&app, Method::GET, "/db/data", Some("test:pass"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_read_write_user_lifecycle() {
    let app = gateway(test_manager(), AccessGate::new());

    let (status, _) = admin_post(&app, "add-user-rw", "test:pass").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::POST, "/db/data/node", Some("test:pass"), None).await;
    assert!(status.is_success());

    let (status, _) = send(&app, Method::DELETE, "/db/data/node/1", Some("test:pass"), None).await;
    assert!(status.is_success());

    admin_post(&app, "remove-user", "test:pass").await;

    let (status, _) = send(&app, Method::GET, "/", Some("test:pass"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Data users never reach admin endpoints
#[tokio::test]
async fn test_non_admin_cannot_provision() {
    let app = gateway(test_manager(), AccessGate::new());
    admin_post(&app, "add-user-rw", "writer:pw").await;
    admin_post(&app, "add-user-ro", "reader:pw").await;

    for credentials in ["writer:pw", "reader:pw"] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/admin/add-user-rw",
            Some(credentials),
            Some("user=mallory:pw"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            send(&app, Method::GET, "/admin/list-users", Some(credentials), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, _) = send(&app, Method::GET, "/", Some("mallory:pw"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Only `add-user-rw` turns a reader into a writer
#[tokio::test]
async fn test_role_escalation_only_via_add_user_rw() {
    let app = gateway(test_manager(), AccessGate::new());
    admin_post(&app, "add-user-ro", "test:pass").await;

    // Re-adding as RO or removing with a different secret never grants writes
    admin_post(&app, "add-user-ro", "test:other").await;
    let (status, _) = send(&app, Method::POST, "/db/data/node", Some("test:other"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    admin_post(&app, "add-user-rw", "test:other").await;
    let (status, _) = send(&app, Method::POST, "/db/data/node", Some("test:other"), None).await;
    assert_eq!(status, StatusCode::CREATED);

    // The old secret was replaced
    let (status, _) = send(&app, Method::GET, "/", Some("test:pass"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_admin_requests() {
    let app = gateway(test_manager(), AccessGate::new());

    for form in ["user=no-colon", "user=:secret", "other=field", "user=empty:"] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/admin/add-user-ro",
            Some(ADMIN),
            Some(form),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", form);
    }

    // The admin identifier cannot be provisioned or removed
    let (status, _) = admin_post(&app, "add-user-rw", "neo4j:hijack").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = admin_post(&app, "remove-user", "neo4j:master").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/admin/list-users", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, "/", Some("neo4j:hijack"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Credential checks run off the request task; a single-threaded runtime
/// still serves interleaved requests correctly
#[tokio::test(flavor = "current_thread")]
async fn test_concurrent_requests_on_one_worker() {
    let app = gateway(test_manager(), AccessGate::new());
    admin_post(&app, "add-user-ro", "reader:pw").await;
    admin_post(&app, "add-user-rw", "writer:pw").await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let (credentials, expected) = match i % 3 {
                0 => ("reader:pw", StatusCode::UNAUTHORIZED),
                1 => ("writer:pw", StatusCode::CREATED),
                _ => ("reader:wrong", StatusCode::UNAUTHORIZED),
            };
            let (status, _) =
                send(&app, Method::POST, "/db/data/node", Some(credentials), None).await;
            assert_eq!(status, expected, "{}", credentials);
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_remove_unknown_user_is_ok() {
    let app = gateway(test_manager(), AccessGate::new());
    let (status, body) = admin_post(&app, "remove-user", "ghost:whatever").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_unknown_admin_path_is_not_forwarded() {
    let app = gateway(test_manager(), AccessGate::new());

    let (status, _) = send(&app, Method::GET, "/admin/shutdown", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/admin", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for path in ["/admin/", "/admin//x", "/admin/list-users/"] {
        for method in [Method::GET, Method::POST] {
            let (status, body) = send(&app, method.clone(), path, Some(ADMIN), None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, path);
            assert_ne!(body, "data");
            assert_ne!(body, "created");
        }
    }

    // Granting the admin a data tier does not open the admin prefix either
    let granted = gateway(
        test_manager(),
        AccessGate::new().with_admin_data_role(Some(Role::ReadWrite)),
    );
    let (status, body) = send(&granted, Method::GET, "/admin/", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_ne!(body, "data");

    // Prefix match is on whole segments
    admin_post(&app, "add-user-ro", "test:pass").await;
    let (status, body) =
        send(&app, Method::GET, "/administrator", Some("test:pass"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "data");
}

#[tokio::test]
async fn test_list_users() {
    let app = gateway(test_manager(), AccessGate::new());
    admin_post(&app, "add-user-rw", "bob:pw").await;
    admin_post(&app, "add-user-ro", "alice:pw").await;

    let (status, body) = send(&app, Method::GET, "/admin/list-users", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);

    let users: Vec<UserMetadata> = serde_json::from_str(&body).unwrap();
    let summary: Vec<_> = users.iter().map(|u| (u.identifier.as_str(), u.role)).collect();
    assert_eq!(
        summary,
        vec![
            ("alice", Role::ReadOnly),
            ("bob", Role::ReadWrite),
            ("neo4j", Role::Admin),
        ]
    );
    assert!(!body.contains("$2"));
}

#[tokio::test]
async fn test_admin_data_access() {
    let denied = gateway(test_manager(), AccessGate::new());
    let (status, _) = send(&denied, Method::GET, "/db/data", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let granted = gateway(
        test_manager(),
        AccessGate::new().with_admin_data_role(Some(Role::ReadOnly)),
    );
    let (status, _) = send(&granted, Method::GET, "/db/data", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&granted, Method::POST, "/db/data/node", Some(ADMIN), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Users added over HTTP survive a restart
#[tokio::test]
async fn test_provisioned_users_persist() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("users.json");

    let storage = FileStorage::new(&path).await.unwrap();
    let app = gateway(test_manager().with_storage(Arc::new(storage)), AccessGate::new());
    admin_post(&app, "add-user-rw", "writer:pw").await;
    admin_post(&app, "add-user-ro", "reader:pw").await;
    admin_post(&app, "remove-user", "reader:pw").await;

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains("\"pw\""));

    let restarted = test_manager().with_storage(Arc::new(FileStorage::new(&path).await.unwrap()));
    assert_eq!(restarted.load_users().await.unwrap(), 1);

    let app = gateway(restarted, AccessGate::new());
    let (status, _) = send(&app, Method::POST, "/db/data/node", Some("writer:pw"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::GET, "/", Some("reader:pw"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// Allowed requests reach a live upstream without the gateway's credentials
#[tokio::test]
async fn test_proxy_forwards_to_upstream() {
    async fn echo(request: axum::extract::Request) -> impl IntoResponse {
        let (parts, body) = request.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        let report = serde_json::json!({
            "method": parts.method.as_str(),
            "uri": parts.uri.to_string(),
            "authorization": parts.headers.contains_key(header::AUTHORIZATION),
            "accept": parts.headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()),
            "body": String::from_utf8_lossy(&bytes),
        });
        (StatusCode::ACCEPTED, [("x-upstream", "graph")], report.to_string())
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, Router::new().fallback(echo)).await.unwrap();
    });

    let proxy = UpstreamProxy::new(&format!("http://{}/", addr), Duration::from_secs(5), 1024).unwrap();
    let manager = test_manager();
    manager
        .add_user("writer", &Secret::new("pw"), Role::ReadWrite)
        .await
        .unwrap();
    let state = AppState::new(Arc::new(manager), AccessGate::new(), "graph");
    let app = build_router(state, proxy.into_router());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/db/data/node?limit=5")
                .header(header::AUTHORIZATION, basic("writer:pw"))
                .header(header::ACCEPT, "application/json")
                .body(Body::from("{\"name\":\"n\"}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers().get("x-upstream").unwrap(), "graph");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let report: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(report["method"], "POST");
    assert_eq!(report["uri"], "/db/data/node?limit=5");
    assert_eq!(report["authorization"], false);
    assert_eq!(report["accept"], "application/json");
    assert_eq!(report["body"], "{\"name\":\"n\"}");

    // Oversized bodies stop at the gateway
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/db/data/node")
                .header(header::AUTHORIZATION, basic("writer:pw"))
                .body(Body::from(vec![b'x'; 4096]))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    // Bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let proxy = UpstreamProxy::new(&format!("http://{}", addr), Duration::from_secs(2), 1024).unwrap();
    let manager = test_manager();
    manager
        .add_user("reader", &Secret::new("pw"), Role::ReadOnly)
        .await
        .unwrap();
    let app = build_router(
        AppState::new(Arc::new(manager), AccessGate::new(), "graph"),
        proxy.into_router(),
    );

    let (status, _) = send(&app, Method::GET, "/db/data", Some("reader:pw"), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
