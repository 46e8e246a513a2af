//! # SiteKit Service Worker
//!
//! Service-worker style offline caching subsystem: intercepts page requests,
//! serves them from versioned cache generations, the network, or a blend of
//! both, and manages cache lifecycle across deployments.
//!
//! ## Architecture
//!
//! ```text
//! CacheWorker (dispatcher)
//!     │
//!     ├── lifecycle   install → precache population
//!     │               activate → generation sweep + client claim
//!     │
//!     ├── classify    request → AssetClass → StrategyKind (RoutePolicy)
//!     │
//!     ├── strategy    cache-first | network-first | stale-while-revalidate
//!     │
//!     └── store       CacheStore
//!                         └── Generation ("precache-v7", "runtime-v7", …)
//!                                 └── CacheKey → CachedResponse
//! ```
//!
//! Every failure path inside the worker terminates in a concrete HTTP-shaped
//! response; nothing at this layer is allowed to take the page down.

use thiserror::Error;

pub mod classify;
pub mod lifecycle;
pub mod precache;
pub mod store;
pub mod strategy;
pub mod worker;

pub use classify::{AssetClass, RoutePolicy};
pub use lifecycle::{ClientRegistry, PageClient, WorkerPhase};
pub use precache::{GenerationName, PrecacheManifest, PrecacheReport};
pub use store::{CacheKey, CacheStore, CachedResponse, MemoryCacheStore};
pub use strategy::StrategyKind;
pub use worker::{CacheWorker, FetchEvent, WorkerConfig, WorkerEvent};

/// Errors that can occur in worker operations.
#[derive(Error, Debug, Clone)]
pub enum SwError {
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid generation name: {0}")]
    InvalidGeneration(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Response not cacheable: status {0}")]
    NotCacheable(u16),
}
