//! Outbound calls to the partner API.
//!
//! A [`ForwardRequest`] describes the partner call a route wants to make.
//! [`PartnerClient::dispatch`] attaches the bearer token, sends it and
//! captures the answer as a [`ForwardResponse`] that is relayed unchanged.

use std::time::Duration;

use axum::{
    body::Bytes,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use reqwest::Client;

use crate::error::{Result, ServerError};

/// Inbound headers that are never forwarded to the partner.
pub const STRIPPED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "x-internal-secret",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "authorization",
    // Bodies are relayed as raw bytes, so the partner must not compress them.
    "accept-encoding",
];

const JSON_CONTENT_TYPE: &str = "application/json";

/// Copy `inbound` without hop-by-hop, internal or credential headers.
pub fn sanitize_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    for name in STRIPPED_HEADERS {
        headers.remove(*name);
    }
    headers
}

/// Percent-encode a caller-supplied value for use as one path segment.
pub fn encode_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// A partner call, before credentials are attached.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Path on the partner API, starting with `/`.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ForwardRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        Self {
            method,
            path: path.into(),
            query: None,
            headers,
            body: None,
        }
    }

    /// Set the query string; empty strings are dropped.
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    /// Replace the outbound headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Send `value` as a JSON body.
    pub fn with_json(self, value: &serde_json::Value) -> Self {
        // Serializing a `Value` cannot fail.
        let body = serde_json::to_vec(value).unwrap_or_default();
        self.with_json_bytes(Bytes::from(body))
    }

    /// Send already-encoded JSON unchanged.
    pub fn with_json_bytes(mut self, body: Bytes) -> Self {
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        self.body = Some(body);
        self
    }

    /// Send `body` with whatever content type the headers already carry.
    pub fn with_body(mut self, body: Bytes) -> Self {
        if !body.is_empty() {
            if !self.headers.contains_key(header::CONTENT_TYPE) {
                self.headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(JSON_CONTENT_TYPE),
                );
            }
            self.body = Some(body);
        }
        self
    }

    fn carries_body(&self) -> bool {
        self.method != Method::GET && self.method != Method::HEAD
    }
}

/// A partner answer, relayed byte-for-byte.
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

impl IntoResponse for ForwardResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}

/// HTTP client bound to the partner base URL.
#[derive(Debug, Clone)]
pub struct PartnerClient {
    client: Client,
    base_url: String,
}

impl PartnerClient {
    /// Create a client whose every call is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServerError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute partner URL for `request`.
    pub fn url_for(&self, request: &ForwardRequest) -> String {
        match &request.query {
            Some(query) => format!("{}{}?{}", self.base_url, request.path, query),
            None => format!("{}{}", self.base_url, request.path),
        }
    }

    /// Send `request` with `token` as bearer credentials.
    pub async fn dispatch(&self, request: ForwardRequest, token: &str) -> Result<ForwardResponse> {
        let url = self.url_for(&request);
        let carries_body = request.carries_body();

        let mut headers = sanitize_headers(&request.headers);
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ServerError::Proxy("access token is not a valid header value".into()))?;
        headers.insert(header::AUTHORIZATION, bearer);
        if !carries_body {
            headers.remove(header::CONTENT_TYPE);
        }

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers);
        if carries_body && let Some(body) = request.body {
            builder = builder.body(body);
        }

        tracing::debug!(method = %request.method, path = %request.path, "Forwarding to partner");

        let response = builder.send().await.map_err(send_error)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(JSON_CONTENT_TYPE)
            .to_string();
        let body = response.bytes().await.map_err(send_error)?;

        if !status.is_success() {
            tracing::info!(status = %status, path = %request.path, "Partner returned non-success status");
        }

        Ok(ForwardResponse {
            status,
            content_type,
            body,
        })
    }
}

fn send_error(e: reqwest::Error) -> ServerError {
    if e.is_timeout() {
        ServerError::UpstreamTimeout(e.to_string())
    } else {
        ServerError::Proxy(format!("Failed to reach partner API: {}", e))
    }
}
