//! The cache worker dispatcher.
//!
//! Owns the store, the fetcher, the route policy, and the lifecycle phase;
//! hosts drive it with install/activate signals and offer it every outgoing
//! request. The worker answers with a response or declines, in which case the
//! host falls through to default fetching.

use std::sync::Arc;

use http::{HeaderValue, Method};
use sitekit_net::{Fetch, Request, Response};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, trace};
use url::Url;

use crate::classify::RoutePolicy;
use crate::lifecycle::{ClientRegistry, WorkerPhase};
use crate::precache::{self, GenerationName, PrecacheManifest, PrecacheReport};
use crate::store::CacheStore;
use crate::strategy;
use crate::SwError;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Origin this worker serves; everything else is declined.
    pub origin: Url,

    /// Name prefix of the precache generation.
    pub precache_prefix: String,

    /// Name prefix of the runtime generation.
    pub runtime_prefix: String,

    /// Route policy.
    pub policy: RoutePolicy,
}

impl WorkerConfig {
    /// Configuration for an origin with default prefixes and policy.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            precache_prefix: "precache".to_string(),
            runtime_prefix: "runtime".to_string(),
            policy: RoutePolicy::default(),
        }
    }
}

/// An intercepted request offered to the worker.
#[derive(Debug, Clone)]
pub struct FetchEvent {
    /// Request URL.
    pub url: Url,

    /// Request method.
    pub method: Method,

    /// Accept header, if the page sent one.
    pub accept: Option<String>,

    /// Originating client, when known.
    pub client_id: Option<String>,
}

impl FetchEvent {
    /// A plain GET for a subresource.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            accept: None,
            client_id: None,
        }
    }

    /// A navigation request (Accept: text/html).
    pub fn navigation(url: Url) -> Self {
        Self::get(url).with_accept("text/html,application/xhtml+xml")
    }

    /// Set the Accept header.
    pub fn with_accept(mut self, accept: &str) -> Self {
        self.accept = Some(accept.to_string());
        self
    }

    /// Set the originating client.
    pub fn with_client(mut self, client_id: &str) -> Self {
        self.client_id = Some(client_id.to_string());
        self
    }
}

/// Lifecycle notifications for hosts and tests.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Phase changed.
    PhaseChange { phase: WorkerPhase },

    /// Precache population finished (possibly partially).
    PrecacheComplete { ok: usize, failed: usize },

    /// Activation sweep removed stale generations.
    GenerationsSwept { deleted: Vec<String> },

    /// A page changed controller.
    ControllerChange { client_id: String },
}

/// The caching worker.
pub struct CacheWorker {
    config: WorkerConfig,
    manifest: PrecacheManifest,
    precache_generation: GenerationName,
    runtime_generation: GenerationName,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetch>,
    phase: RwLock<WorkerPhase>,
    clients: RwLock<ClientRegistry>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl CacheWorker {
    /// Create a worker plus the receiving end of its event stream.
    pub fn new(
        config: WorkerConfig,
        manifest: PrecacheManifest,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetch>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let precache_generation = GenerationName::new(&config.precache_prefix, manifest.version);
        let runtime_generation = GenerationName::new(&config.runtime_prefix, manifest.version);

        (
            Self {
                config,
                manifest,
                precache_generation,
                runtime_generation,
                store,
                fetcher,
                phase: RwLock::new(WorkerPhase::Idle),
                clients: RwLock::new(ClientRegistry::new()),
                event_tx,
            },
            event_rx,
        )
    }

    /// Current phase.
    pub async fn phase(&self) -> WorkerPhase {
        *self.phase.read().await
    }

    /// Name of the current precache generation.
    pub fn precache_generation(&self) -> &GenerationName {
        &self.precache_generation
    }

    /// Name of the current runtime generation.
    pub fn runtime_generation(&self) -> &GenerationName {
        &self.runtime_generation
    }

    /// Register an open page.
    pub async fn add_client(&self, id: &str, url: Url) {
        self.clients.write().await.add(id, url);
    }

    /// Remove a closed page.
    pub async fn remove_client(&self, id: &str) {
        self.clients.write().await.remove(id);
    }

    /// Number of pages this worker controls.
    pub async fn controlled_clients(&self) -> usize {
        self.clients.read().await.controlled_count()
    }

    /// Install: populate the precache generation from the manifest.
    ///
    /// Per-asset failures are tolerated; the report says how the pass went.
    /// On return the worker is ready for immediate activation, it never waits
    /// for already-open pages to close.
    pub async fn install(&self) -> Result<PrecacheReport, SwError> {
        self.transition(WorkerPhase::Idle, WorkerPhase::Installing)
            .await?;
        info!(generation = %self.precache_generation, assets = self.manifest.assets.len(), "installing");

        let report = precache::populate(
            &self.store,
            &self.fetcher,
            &self.config.origin,
            &self.precache_generation,
            &self.manifest.assets,
        )
        .await;

        self.emit(WorkerEvent::PrecacheComplete {
            ok: report.ok,
            failed: report.failed,
        });
        self.set_phase(WorkerPhase::Idle).await;
        Ok(report)
    }

    /// Activate: sweep stale generations and take over open pages.
    ///
    /// Returns the names of the generations that were deleted.
    pub async fn activate(&self) -> Result<Vec<String>, SwError> {
        self.transition(WorkerPhase::Idle, WorkerPhase::Activating)
            .await?;

        let keep = [
            self.precache_generation.to_string(),
            self.runtime_generation.to_string(),
        ];

        let mut deleted = Vec::new();
        for name in self.store.list_generations().await {
            if !keep.contains(&name) && self.store.delete_generation(&name).await {
                debug!(generation = %name, "swept stale generation");
                deleted.push(name);
            }
        }
        self.emit(WorkerEvent::GenerationsSwept {
            deleted: deleted.clone(),
        });

        let claimed = self.clients.write().await.claim();
        for client_id in claimed {
            self.emit(WorkerEvent::ControllerChange { client_id });
        }

        self.set_phase(WorkerPhase::Active).await;
        info!(generation = %self.precache_generation, swept = deleted.len(), "activated");
        Ok(deleted)
    }

    /// Offer an intercepted request to the worker.
    ///
    /// Returns None to decline: cross-origin and non-GET requests, and any
    /// request arriving before the worker is active, fall through to the
    /// host's default fetching.
    pub async fn handle_fetch(&self, event: FetchEvent) -> Option<Response> {
        if !self.phase.read().await.can_handle_fetch() {
            trace!(url = %event.url, "declined: worker not active");
            return None;
        }
        if event.method != Method::GET {
            trace!(url = %event.url, method = %event.method, "declined: non-GET");
            return None;
        }
        if event.url.origin() != self.config.origin.origin() {
            trace!(url = %event.url, "declined: cross-origin");
            return None;
        }

        let class = self
            .config
            .policy
            .classify(event.url.path(), event.accept.as_deref());
        let kind = self.config.policy.strategy_for(class);
        debug!(url = %event.url, class = %class, strategy = %kind, "handling fetch");

        let mut request = Request::get(event.url);
        if let Some(accept) = event.accept.as_deref() {
            if let Ok(value) = HeaderValue::try_from(accept) {
                request = request.header(http::header::ACCEPT, value);
            }
        }

        let runtime = self.runtime_generation.to_string();
        Some(strategy::execute(kind, &self.store, &self.fetcher, &runtime, request).await)
    }

    async fn transition(&self, from: WorkerPhase, to: WorkerPhase) -> Result<(), SwError> {
        let mut phase = self.phase.write().await;
        if *phase != from {
            return Err(SwError::State(format!(
                "expected phase {}, currently {}",
                from, *phase
            )));
        }
        *phase = to;
        drop(phase);
        self.emit(WorkerEvent::PhaseChange { phase: to });
        Ok(())
    }

    async fn set_phase(&self, to: WorkerPhase) {
        *self.phase.write().await = to;
        self.emit(WorkerEvent::PhaseChange { phase: to });
    }

    fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }
}
