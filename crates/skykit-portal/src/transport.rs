//! Request execution seam between the portal client and the network

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use skykit_core::config::PortalConfig;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A request relative to the portal base URL.
#[derive(Debug, Clone)]
pub struct PortalRequest {
    pub method: Method,
    /// Absolute path on the portal, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Largest response body the caller will accept
    pub max_body: Option<usize>,
}

impl PortalRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            max_body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_max_body(mut self, limit: usize) -> Self {
        self.max_body = Some(limit);
        self
    }

    /// Value of a query parameter, if present.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PortalResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Failures below HTTP: the portal never produced a status code.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid portal url: {0}")]
    InvalidUrl(String),

    #[error("response body of {size} bytes exceeds the {max}-byte limit")]
    BodyTooLarge { size: u64, max: usize },
}

/// Executes portal requests. Implementations own timeouts and connection
/// handling; a timeout must surface as [`TransportError::Timeout`]. When the
/// request sets `max_body`, a longer body must be refused with
/// [`TransportError::BodyTooLarge`] without buffering past the limit.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: PortalRequest) -> Result<PortalResponse, TransportError>;
}

/// HTTPS transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base: Url,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let base = Url::parse(base_url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(format!(
                "{base_url} cannot be used as a base url"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { base, client })
    }

    /// Build from portal config: normalized URL and configured timeout.
    pub fn from_config(cfg: &PortalConfig) -> Result<Self, TransportError> {
        let url = cfg
            .normalized_url()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        Self::new(&url, Duration::from_secs(cfg.timeout_secs))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url_for(&self, request: &PortalRequest) -> Url {
        let mut url = self.base.clone();
        let path = format!(
            "{}/{}",
            self.base.path().trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        url.set_path(&path);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        url
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: PortalRequest) -> Result<PortalResponse, TransportError> {
        let url = self.url_for(&request);
        tracing::trace!(method = %request.method, %url, "sending portal request");

        let max_body = request.max_body;
        let mut response = self
            .client
            .request(request.method, url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let headers = response.headers().clone();

        let Some(max) = max_body else {
            let body = response.bytes().await.map_err(classify)?;
            return Ok(PortalResponse {
                status,
                headers,
                body,
            });
        };

        // Declared length first, then a running cap for chunked bodies
        if let Some(declared) = response.content_length() {
            if declared > max as u64 {
                return Err(TransportError::BodyTooLarge { size: declared, max });
            }
        }
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            if body.len() + chunk.len() > max {
                return Err(TransportError::BodyTooLarge {
                    size: (body.len() + chunk.len()) as u64,
                    max,
                });
            }
            body.extend_from_slice(&chunk);
        }
        let body = body.freeze();
        Ok(PortalResponse {
            status,
            headers,
            body,
        })
    }
}
