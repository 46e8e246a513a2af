//! Caching strategies.
//!
//! Each strategy takes a request and always produces a response; when both
//! network and cache are exhausted it degrades to a synthetic error response
//! instead of propagating a failure to the page.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sitekit_net::{Fetch, Request, Response};
use tracing::{debug, warn};

use crate::store::{CacheKey, CacheStore, CachedResponse};

/// The three caching algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Serve from cache; go to the network only on a miss.
    CacheFirst,
    /// Serve from the network; fall back to cache when it fails.
    NetworkFirst,
    /// Serve from cache immediately, refresh it in the background.
    StaleWhileRevalidate,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::CacheFirst => write!(f, "cache-first"),
            StrategyKind::NetworkFirst => write!(f, "network-first"),
            StrategyKind::StaleWhileRevalidate => write!(f, "stale-while-revalidate"),
        }
    }
}

/// Run the given strategy for a request.
pub async fn execute(
    kind: StrategyKind,
    store: &Arc<dyn CacheStore>,
    fetcher: &Arc<dyn Fetch>,
    runtime_generation: &str,
    request: Request,
) -> Response {
    match kind {
        StrategyKind::CacheFirst => cache_first(store, fetcher, runtime_generation, request).await,
        StrategyKind::NetworkFirst => {
            network_first(store, fetcher, runtime_generation, request).await
        }
        StrategyKind::StaleWhileRevalidate => {
            stale_while_revalidate(store, fetcher, runtime_generation, request).await
        }
    }
}

/// Cache-first: any cached copy wins outright; the network is only consulted
/// for cold entries.
pub async fn cache_first(
    store: &Arc<dyn CacheStore>,
    fetcher: &Arc<dyn Fetch>,
    runtime_generation: &str,
    request: Request,
) -> Response {
    let key = CacheKey::for_request(&request);

    if let Some(entry) = store.match_key(&key).await {
        debug!(key = %key, "cache-first hit");
        return entry.to_response(request.url);
    }

    match fetcher.fetch(request.clone()).await {
        Ok(response) => {
            store_success(store, runtime_generation, key, &response).await;
            response
        }
        Err(e) => {
            warn!(key = %key, error = %e, "cache-first miss and network failed");
            Response::asset_unavailable(request.url)
        }
    }
}

/// Network-first: live response wins; cache is the offline fallback.
pub async fn network_first(
    store: &Arc<dyn CacheStore>,
    fetcher: &Arc<dyn Fetch>,
    runtime_generation: &str,
    request: Request,
) -> Response {
    let key = CacheKey::for_request(&request);

    match fetcher.fetch(request.clone()).await {
        Ok(response) => {
            store_success(store, runtime_generation, key, &response).await;
            response
        }
        Err(e) => {
            debug!(key = %key, error = %e, "network-first falling back to cache");
            match store.match_key(&key).await {
                Some(entry) => entry.to_response(request.url),
                None => {
                    warn!(key = %key, "network failed and nothing cached");
                    Response::resource_unavailable(request.url)
                }
            }
        }
    }
}

/// Stale-while-revalidate: a cached copy is returned immediately while a
/// detached refresh updates the entry for next time. The refresh outcome is
/// never awaited and its failure is ignored.
pub async fn stale_while_revalidate(
    store: &Arc<dyn CacheStore>,
    fetcher: &Arc<dyn Fetch>,
    runtime_generation: &str,
    request: Request,
) -> Response {
    let key = CacheKey::for_request(&request);

    if let Some(entry) = store.match_key(&key).await {
        debug!(key = %key, "serving stale, revalidating in background");

        let store = Arc::clone(store);
        let fetcher = Arc::clone(fetcher);
        let generation = runtime_generation.to_string();
        let refresh_key = key.clone();
        let refresh_request = request.clone();
        tokio::spawn(async move {
            match fetcher.fetch(refresh_request).await {
                Ok(response) if response.ok() => {
                    let capture = CachedResponse::capture(&response);
                    if let Err(e) = store.put(&generation, refresh_key.clone(), capture).await {
                        debug!(key = %refresh_key, error = %e, "revalidation store failed");
                    }
                }
                Ok(response) => {
                    debug!(key = %refresh_key, status = %response.status, "revalidation skipped");
                }
                Err(e) => {
                    debug!(key = %refresh_key, error = %e, "revalidation fetch failed");
                }
            }
        });

        return entry.to_response(request.url);
    }

    match fetcher.fetch(request.clone()).await {
        Ok(response) => {
            store_success(store, runtime_generation, key, &response).await;
            response
        }
        Err(e) => {
            warn!(key = %key, error = %e, "cold entry and network failed");
            Response::asset_unavailable(request.url)
        }
    }
}

/// Store a 2xx response into the runtime generation; anything else passes
/// through uncached.
async fn store_success(
    store: &Arc<dyn CacheStore>,
    generation: &str,
    key: CacheKey,
    response: &Response,
) {
    if !response.ok() {
        return;
    }
    let capture = CachedResponse::capture(response);
    if let Err(e) = store.put(generation, key.clone(), capture).await {
        warn!(key = %key, error = %e, "failed to store response");
    }
}
