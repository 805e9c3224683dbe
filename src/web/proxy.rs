//! Upstream forwarding for data paths
//!
//! Requests that pass the filter are replayed against the upstream graph
//! server with the same method, path, query, headers and body. The
//! gateway's own `Authorization` header never leaves the process.

use axum::{
    body::{self, Body},
    extract::{OriginalUri, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Connection-scoped headers that are never forwarded in either direction
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forwards allowed data requests to the upstream server
pub struct UpstreamProxy {
    client: Client,
    base_url: String,
    max_body_bytes: usize,
}

impl UpstreamProxy {
    /// Create a proxy for `base_url`
    ///
    /// A trailing slash on `base_url` is ignored.
    pub fn new(base_url: &str, timeout: Duration, max_body_bytes: usize) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent("vestibule/0.1.0")
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_body_bytes,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward a request and relay the upstream response
    pub async fn forward(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();

        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or(parts.uri);
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let url = format!("{}{}", self.base_url, path_and_query);

        let body = match body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = %url, error = %e, "Request body rejected");
                return (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response();
            }
        };

        let mut headers = parts.headers;
        strip_request_headers(&mut headers);

        debug!(method = %parts.method, url = %url, "Forwarding to upstream");

        let upstream = match self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return bad_gateway(&url, &e),
        };

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        let bytes = match upstream.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return bad_gateway(&url, &e),
        };

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    /// Router that forwards every request it receives
    pub fn into_router(self) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(Arc::new(self))
    }
}

async fn proxy_handler(State(proxy): State<Arc<UpstreamProxy>>, request: Request) -> Response {
    proxy.forward(request).await
}

fn bad_gateway(url: &str, error: &reqwest::Error) -> Response {
    warn!(url = %url, error = %error, "Upstream request failed");
    (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Remove headers the client addressed to the gateway itself
fn strip_request_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
    headers.remove(header::HOST);
    headers.remove(header::AUTHORIZATION);
    headers.remove(header::CONTENT_LENGTH);
}
