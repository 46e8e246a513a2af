//! Cache generations and the store abstraction.
//!
//! A store holds named generations; each generation maps a request identity
//! to a full response capture. Entries carry no TTL and only disappear when
//! their whole generation is deleted during the activation sweep.

use async_trait::async_trait;
use hashbrown::HashMap;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use sitekit_net::{Request, Response};
use tokio::sync::RwLock;
use url::Url;

use crate::SwError;

/// Identity of a cached request: method plus absolute URL (query included).
///
/// Only GET identities are ever written; the router declines everything else
/// before a strategy runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    /// Key for a GET of the given URL.
    pub fn for_get(url: &Url) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.to_string(),
        }
    }

    /// Key for an outgoing request.
    pub fn for_request(request: &Request) -> Self {
        Self {
            method: request.method.to_string(),
            url: request.url.to_string(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A captured response: status, headers, body bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Capture timestamp (ms since epoch).
    pub captured_at: u64,
}

impl CachedResponse {
    /// Capture a live response.
    pub fn capture(response: &Response) -> Self {
        let mut headers = HashMap::new();
        for (name, value) in response.headers.iter() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }
        Self {
            status: response.status.as_u16(),
            headers,
            body: response.body.to_vec(),
            captured_at: now_ms(),
        }
    }

    /// Reconstruct a response for the given request URL.
    pub fn to_response(&self, url: Url) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(n), Ok(v)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(n, v);
            }
        }
        Response {
            url,
            status: StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK),
            headers,
            body: self.body.clone().into(),
        }
    }

    /// Check if the capture is a success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A named cache generation.
#[derive(Debug, Default)]
pub struct Generation {
    /// Generation name, e.g. "precache-v7".
    pub name: String,

    entries: HashMap<CacheKey, CachedResponse>,
}

impl Generation {
    /// Create a new empty generation.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a key.
    pub fn match_key(&self, key: &CacheKey) -> Option<&CachedResponse> {
        self.entries.get(key)
    }

    /// Insert or overwrite an entry.
    pub fn put(&mut self, key: CacheKey, response: CachedResponse) {
        self.entries.insert(key, response);
    }

    /// All keys in this generation.
    pub fn keys(&self) -> Vec<&CacheKey> {
        self.entries.keys().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the generation is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Storage for cache generations.
///
/// Injected into the worker so tests can substitute doubles; writes are
/// last-write-wins with single-entry atomicity, no transactions.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Match a key across all generations; any generation may answer.
    async fn match_key(&self, key: &CacheKey) -> Option<CachedResponse>;

    /// Match a key in one named generation.
    async fn match_in(&self, generation: &str, key: &CacheKey) -> Option<CachedResponse>;

    /// Store a capture into the named generation, creating it if needed.
    ///
    /// Only successful (2xx) GET captures are accepted.
    async fn put(
        &self,
        generation: &str,
        key: CacheKey,
        response: CachedResponse,
    ) -> Result<(), SwError>;

    /// Delete a whole generation. Returns true if it existed.
    async fn delete_generation(&self, name: &str) -> bool;

    /// Names of all existing generations.
    async fn list_generations(&self) -> Vec<String>;
}

/// In-memory cache store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    generations: RwLock<HashMap<String, Generation>>,
}

impl MemoryCacheStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn match_key(&self, key: &CacheKey) -> Option<CachedResponse> {
        let generations = self.generations.read().await;
        for generation in generations.values() {
            if let Some(entry) = generation.match_key(key) {
                return Some(entry.clone());
            }
        }
        None
    }

    async fn match_in(&self, generation: &str, key: &CacheKey) -> Option<CachedResponse> {
        let generations = self.generations.read().await;
        generations
            .get(generation)
            .and_then(|g| g.match_key(key))
            .cloned()
    }

    async fn put(
        &self,
        generation: &str,
        key: CacheKey,
        response: CachedResponse,
    ) -> Result<(), SwError> {
        if key.method != "GET" {
            return Err(SwError::Cache(format!(
                "only GET requests are cacheable, got {}",
                key.method
            )));
        }
        if !response.is_success() {
            return Err(SwError::NotCacheable(response.status));
        }

        let mut generations = self.generations.write().await;
        generations
            .entry(generation.to_string())
            .or_insert_with(|| Generation::new(generation))
            .put(key, response);
        Ok(())
    }

    async fn delete_generation(&self, name: &str) -> bool {
        self.generations.write().await.remove(name).is_some()
    }

    async fn list_generations(&self) -> Vec<String> {
        self.generations.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn capture(status: u16, body: &[u8]) -> CachedResponse {
        CachedResponse {
            status,
            headers: HashMap::new(),
            body: body.to_vec(),
            captured_at: 0,
        }
    }

    fn key(url: &str) -> CacheKey {
        CacheKey::for_get(&Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let store = MemoryCacheStore::new();
        let k = key("https://example.com/styles.css");

        store
            .put("runtime-v1", k.clone(), capture(200, b"body"))
            .await
            .unwrap();

        let entry = store.match_key(&k).await.unwrap();
        assert_eq!(entry.body, b"body");

        let entry = store.match_in("runtime-v1", &k).await.unwrap();
        assert_eq!(entry.status, 200);

        assert!(store.match_in("precache-v1", &k).await.is_none());
    }

    #[tokio::test]
    async fn test_only_success_is_written() {
        let store = MemoryCacheStore::new();
        let k = key("https://example.com/missing.png");

        let err = store
            .put("runtime-v1", k.clone(), capture(404, b"nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, SwError::NotCacheable(404)));
        assert!(store.match_key(&k).await.is_none());
    }

    #[tokio::test]
    async fn test_only_get_is_written() {
        let store = MemoryCacheStore::new();
        let k = CacheKey {
            method: "POST".to_string(),
            url: "https://example.com/api".to_string(),
        };

        let err = store
            .put("runtime-v1", k, capture(200, b"ok"))
            .await
            .unwrap_err();
        assert!(matches!(err, SwError::Cache(_)));
    }

    #[tokio::test]
    async fn test_overwrite_on_revalidation() {
        let store = MemoryCacheStore::new();
        let k = key("https://example.com/app.js");

        store
            .put("runtime-v1", k.clone(), capture(200, b"OLD"))
            .await
            .unwrap();
        store
            .put("runtime-v1", k.clone(), capture(200, b"NEW"))
            .await
            .unwrap();

        assert_eq!(store.match_key(&k).await.unwrap().body, b"NEW");
    }

    #[tokio::test]
    async fn test_delete_generation() {
        let store = MemoryCacheStore::new();
        let k = key("https://example.com/");

        store
            .put("precache-v1", k.clone(), capture(200, b"home"))
            .await
            .unwrap();
        assert!(store.delete_generation("precache-v1").await);
        assert!(!store.delete_generation("precache-v1").await);
        assert!(store.match_key(&k).await.is_none());
    }

    #[tokio::test]
    async fn test_list_generations() {
        let store = MemoryCacheStore::new();
        let k = key("https://example.com/");

        store
            .put("precache-v1", k.clone(), capture(200, b"a"))
            .await
            .unwrap();
        store
            .put("runtime-v1", k, capture(200, b"b"))
            .await
            .unwrap();

        let mut names = store.list_generations().await;
        names.sort();
        assert_eq!(names, vec!["precache-v1", "runtime-v1"]);
    }

    #[test]
    fn test_capture_roundtrip() {
        let url = Url::parse("https://example.com/styles.css").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/css"));

        let live = Response {
            url: url.clone(),
            status: StatusCode::OK,
            headers,
            body: Bytes::from("body { margin: 0 }"),
        };

        let captured = CachedResponse::capture(&live);
        assert!(captured.is_success());

        let replayed = captured.to_response(url);
        assert_eq!(replayed.status, StatusCode::OK);
        assert_eq!(replayed.content_type(), Some("text/css"));
        assert_eq!(replayed.body, live.body);
    }

    #[test]
    fn test_cache_key_display() {
        let k = key("https://example.com/styles.css?v=abc");
        assert_eq!(k.to_string(), "GET https://example.com/styles.css?v=abc");
    }
}
