//! Reverse proxy to the rendering server.
//!
//! Transport failures are translated into [`ProxyError`] kinds at this
//! boundary; clients never see a raw connection error.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::Client;
use thiserror::Error;

/// Largest request body forwarded upstream.
pub const MAX_FORWARD_BODY: usize = 10 * 1024 * 1024;

/// Headers that describe a single connection and must not be forwarded.
static HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("No presentation server is running. Upload a markdown file to start one.")]
    NotRunning,

    #[error("Presentation server is starting. Please retry in a few seconds.")]
    Starting,

    #[error("Presentation server error: {0}")]
    Upstream(#[source] reqwest::Error),

    #[error("Failed to read request body: {0}")]
    Body(#[source] axum::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NotRunning | ProxyError::Starting => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::Body(_) => StatusCode::BAD_REQUEST,
            ProxyError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            ProxyError::Starting
        } else {
            ProxyError::Upstream(e)
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Proxy error: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

/// Forwards requests to a fixed upstream origin.
#[derive(Debug, Clone)]
pub struct UpstreamProxy {
    base_url: String,
    client: Client,
}

impl UpstreamProxy {
    /// `base_url` is an origin such as `http://127.0.0.1:1948`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProxyError> {
        let client = Client::builder()
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ProxyError::Client)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Proxy for a rendering server listening on localhost.
    pub fn local(port: u16) -> Result<Self, ProxyError> {
        Self::new(format!("http://127.0.0.1:{}", port))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn forward(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.base_url, path);

        let body = axum::body::to_bytes(body, MAX_FORWARD_BODY)
            .await
            .map_err(ProxyError::Body)?;

        let mut headers = strip_hop_by_hop(&parts.headers);
        headers.remove(header::HOST);

        tracing::debug!("Proxying {} {}", parts.method, url);
        let upstream = self
            .client
            .request(parts.method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers());
        let body: Bytes = upstream.bytes().await?;

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response.headers_mut().remove(header::CONTENT_LENGTH);
        Ok(response)
    }
}

fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(HeaderName::from_static("keep-alive"));
    headers
}
