//! Generation naming and install-time precache population.
//!
//! The manifest is deploy-time configuration: the external cache-busting
//! process rewrites the asset list (content-hash query parameters included)
//! and bumps the version integer, which renames both generations and arms the
//! activation sweep.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sitekit_net::{Fetch, Request};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::store::{CacheKey, CacheStore, CachedResponse};
use crate::SwError;

/// A `<prefix>-v<integer>` cache generation name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationName {
    pub prefix: String,
    pub version: u32,
}

impl GenerationName {
    /// Create a name from prefix and version.
    pub fn new(prefix: &str, version: u32) -> Self {
        Self {
            prefix: prefix.to_string(),
            version,
        }
    }

    /// Parse a name like "precache-v7".
    pub fn parse(name: &str) -> Result<Self, SwError> {
        let (prefix, version) = name
            .rsplit_once("-v")
            .ok_or_else(|| SwError::InvalidGeneration(name.to_string()))?;
        if prefix.is_empty() {
            return Err(SwError::InvalidGeneration(name.to_string()));
        }
        let version = version
            .parse()
            .map_err(|_| SwError::InvalidGeneration(name.to_string()))?;
        Ok(Self::new(prefix, version))
    }
}

impl std::fmt::Display for GenerationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-v{}", self.prefix, self.version)
    }
}

/// Deploy-time precache configuration: version plus the critical asset list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecacheManifest {
    /// Deployment version; bumped whenever source assets change.
    pub version: u32,

    /// Site-relative URLs to populate eagerly at install time.
    pub assets: Vec<String>,
}

impl PrecacheManifest {
    /// Parse a manifest from JSON.
    pub fn from_json(json: &str) -> Result<Self, SwError> {
        serde_json::from_str(json).map_err(|e| SwError::Manifest(e.to_string()))
    }

    /// An empty manifest at the given version.
    pub fn empty(version: u32) -> Self {
        Self {
            version,
            assets: Vec::new(),
        }
    }
}

/// Outcome of a precache population pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecacheReport {
    /// Assets fetched and stored.
    pub ok: usize,
    /// Assets that failed to fetch or store.
    pub failed: usize,
}

/// Populate a generation with the manifest's assets.
///
/// Every asset is fetched and stored as its own task; individual failures are
/// logged and counted, and never abort the rest of the pass.
pub async fn populate(
    store: &Arc<dyn CacheStore>,
    fetcher: &Arc<dyn Fetch>,
    origin: &Url,
    generation: &GenerationName,
    assets: &[String],
) -> PrecacheReport {
    let generation = generation.to_string();
    let mut tasks = JoinSet::new();

    for asset in assets {
        let url = match origin.join(asset) {
            Ok(url) => url,
            Err(e) => {
                warn!(asset = %asset, error = %e, "precache asset has invalid URL");
                tasks.spawn(async { false });
                continue;
            }
        };

        let store = Arc::clone(store);
        let fetcher = Arc::clone(fetcher);
        let generation = generation.clone();
        tasks.spawn(async move {
            let key = CacheKey::for_get(&url);
            match fetcher.fetch(Request::get(url)).await {
                Ok(response) if response.ok() => {
                    let capture = CachedResponse::capture(&response);
                    match store.put(&generation, key.clone(), capture).await {
                        Ok(()) => {
                            debug!(key = %key, "precached");
                            true
                        }
                        Err(e) => {
                            warn!(key = %key, error = %e, "precache store failed");
                            false
                        }
                    }
                }
                Ok(response) => {
                    warn!(key = %key, status = %response.status, "precache fetch not successful");
                    false
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "precache fetch failed");
                    false
                }
            }
        });
    }

    let mut report = PrecacheReport { ok: 0, failed: 0 };
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(true) => report.ok += 1,
            Ok(false) => report.failed += 1,
            Err(e) => {
                warn!(error = %e, "precache task aborted");
                report.failed += 1;
            }
        }
    }

    info!(ok = report.ok, failed = report.failed, generation = %generation, "precache complete");
    report
}
