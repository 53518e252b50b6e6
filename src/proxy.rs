//! Pass-through HTTP proxy.
//!
//! Every request is forwarded to one internal backend with its method,
//! path, query, headers and body. Hop-by-hop headers are dropped in both
//! directions.

use crate::config::ProxyConfig;
use crate::error::ServiceError;
use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, Uri},
    response::Response,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Largest request body forwarded upstream.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "keep-alive",
];

pub struct ProxyState {
    client: reqwest::Client,
    backend_url: String,
    timeout_seconds: u64,
}

impl ProxyState {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            backend_url: config.backend_url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Upstream URL for an incoming request URI.
    pub fn target_url(&self, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{}{}", self.backend_url, path_and_query)
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in &listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

pub fn proxy_router(state: Arc<ProxyState>) -> Router {
    Router::new()
        .fallback(forward)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn forward(
    State(state): State<Arc<ProxyState>>,
    request: Request,
) -> Result<Response, ServiceError> {
    let (parts, body) = request.into_parts();
    let url = state.target_url(&parts.uri);

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ServiceError::Validation(format!("unreadable request body: {}", e)))?;

    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    debug!("Forwarding {} {}", parts.method, url);

    let upstream = state
        .client
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ServiceError::Upstream(format!(
                    "backend timed out after {}s",
                    state.timeout_seconds
                ))
            } else if e.is_connect() {
                ServiceError::Upstream(format!("cannot connect to {}", state.backend_url))
            } else {
                ServiceError::Upstream(format!("backend request failed: {}", e))
            }
        })?;

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);

    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| ServiceError::Upstream(format!("failed to read backend response: {}", e)))?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Run the proxy until Ctrl+C or SIGTERM.
pub async fn serve(config: &ProxyConfig) -> Result<()> {
    let state = Arc::new(ProxyState::new(config)?);
    let app = proxy_router(state);

    let address = format!("0.0.0.0:{}", config.listen_port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(
        "Proxy running on {}, forwarding to {}",
        address, config.backend_url
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(crate::server::shutdown_signal())
        .await
        .context("Proxy error")?;

    Ok(())
}
