//! Asset classification and route policy.
//!
//! Classification is stateless: recomputed per request from the URL path and
//! the Accept header, never persisted. The class-to-strategy mapping is
//! deployment configuration, not a fixed contract.

use serde::{Deserialize, Serialize};

use crate::strategy::StrategyKind;

/// Derived category of a request, used to select a caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetClass {
    /// HTML pages and navigations.
    Navigation,
    /// Images under the configured prefix.
    Image,
    /// Stylesheets, scripts, fonts.
    StaticAsset,
    /// Everything else.
    Dynamic,
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetClass::Navigation => write!(f, "navigation"),
            AssetClass::Image => write!(f, "image"),
            AssetClass::StaticAsset => write!(f, "static"),
            AssetClass::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Route policy: how requests are classified and which strategy each class
/// gets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePolicy {
    /// Path prefix for the images directory.
    pub image_prefix: String,

    /// Extensions treated as static-immutable assets.
    pub static_extensions: Vec<String>,

    /// Strategy for HTML navigations.
    pub navigation: StrategyKind,

    /// Strategy for images.
    pub image: StrategyKind,

    /// Strategy for static assets.
    pub static_asset: StrategyKind,

    /// Strategy for uncategorized requests.
    pub dynamic: StrategyKind,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            image_prefix: "/images/".to_string(),
            static_extensions: ["css", "js", "mjs", "woff", "woff2", "ttf", "otf"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            navigation: StrategyKind::NetworkFirst,
            image: StrategyKind::CacheFirst,
            static_asset: StrategyKind::StaleWhileRevalidate,
            dynamic: StrategyKind::NetworkFirst,
        }
    }
}

impl RoutePolicy {
    /// Classify a request from its URL path and Accept header.
    pub fn classify(&self, path: &str, accept: Option<&str>) -> AssetClass {
        // Navigations advertise themselves in the Accept header.
        if accept.is_some_and(|a| a.contains("text/html")) {
            return AssetClass::Navigation;
        }

        if path.starts_with(&self.image_prefix) {
            return AssetClass::Image;
        }

        match path_extension(path) {
            Some(ext) if self.static_extensions.iter().any(|s| s.as_str() == ext) => {
                AssetClass::StaticAsset
            }
            Some("html") => AssetClass::Navigation,
            Some(_) => AssetClass::Dynamic,
            // "/" and extensionless paths are pages.
            None => AssetClass::Navigation,
        }
    }

    /// Strategy assigned to a class.
    pub fn strategy_for(&self, class: AssetClass) -> StrategyKind {
        match class {
            AssetClass::Navigation => self.navigation,
            AssetClass::Image => self.image,
            AssetClass::StaticAsset => self.static_asset,
            AssetClass::Dynamic => self.dynamic,
        }
    }
}

/// Extension of the final path segment. Returns None for "/", directory
/// paths, and extensionless segments.
fn path_extension(path: &str) -> Option<&str> {
    let segment = path.rsplit('/').next().unwrap_or("");
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}
