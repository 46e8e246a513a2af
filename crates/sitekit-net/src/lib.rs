//! # SiteKit Net
//!
//! HTTP request/response capture types and the fetch abstraction used by the
//! SiteKit offline caching worker.
//!
//! ## Design Goals
//!
//! 1. **Injected network seam**: strategies depend on the [`Fetch`] trait, not
//!    on a concrete client, so tests can script network behavior
//! 2. **Full captures**: responses are complete status/header/body snapshots
//!    that can be stored and replayed from a cache
//! 3. **HTTP-shaped failures**: when both network and cache are exhausted, the
//!    caller still receives a concrete [`Response`], never an error

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

/// Errors that can occur while fetching.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// An outgoing request as seen by the caching worker.
///
/// The worker only ever issues GETs, but the method travels with the request
/// so cache identity stays method-qualified.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
}

impl Request {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
        }
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the Accept header.
    pub fn accept(self, value: &'static str) -> Self {
        self.header(http::header::ACCEPT, HeaderValue::from_static(value))
    }

    /// Get the Accept header, if present.
    pub fn accept_header(&self) -> Option<&str> {
        self.headers
            .get(http::header::ACCEPT)
            .and_then(|v| v.to_str().ok())
    }
}

/// A full response capture: status, headers, body.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Check if the response is a success (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Get a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get content-type from headers.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Get the body as text.
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }

    /// Build a minimal synthetic plain-text response.
    ///
    /// Used when the worker has claimed a request but neither network nor
    /// cache can satisfy it; the page gets a real HTTP-shaped answer instead
    /// of a connection error.
    pub fn synthetic(url: Url, status: StatusCode, message: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self {
            url,
            status,
            headers,
            body: Bytes::copy_from_slice(message.as_bytes()),
        }
    }

    /// Synthetic 404 for cache-first / revalidation misses.
    pub fn asset_unavailable(url: Url) -> Self {
        Self::synthetic(url, StatusCode::NOT_FOUND, "asset not available")
    }

    /// Synthetic 503 for network-first requests with no fallback.
    pub fn resource_unavailable(url: Url) -> Self {
        Self::synthetic(url, StatusCode::SERVICE_UNAVAILABLE, "resource not available")
    }
}

/// The network collaborator the caching strategies call into.
///
/// Production uses [`NetworkFetcher`]; tests inject scripted doubles.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch a request from the network.
    async fn fetch(&self, request: Request) -> Result<Response, NetError>;
}

/// Fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// User agent string.
    pub user_agent: String,
    /// Default request timeout.
    pub timeout: std::time::Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "SiteKit/1.0".to_string(),
            timeout: std::time::Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

/// Network fetcher backed by reqwest.
pub struct NetworkFetcher {
    client: reqwest::Client,
}

impl NetworkFetcher {
    /// Create a new fetcher with default configuration.
    pub fn new() -> Result<Self, NetError> {
        Self::with_config(FetcherConfig::default())
    }

    /// Create a new fetcher with custom configuration.
    pub fn with_config(config: FetcherConfig) -> Result<Self, NetError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for NetworkFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in request.headers.iter() {
            req_builder = req_builder.header(name, value);
        }

        let response = req_builder.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        trace!(
            url = %url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }
}
