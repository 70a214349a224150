//! Worker script and global scope.
//!
//! A [`WorkerScript`] is the declarative body of the inline service worker:
//! which cache generation it owns and how it routes requests. It travels as
//! a JSON blob behind an object URL, the way generated worker source would.
//! [`WorkerGlobalScope`] is one running instance of a script and handles the
//! `install`, `activate` and `fetch` events.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use birdnet_common::birdnet::{API_PATH, BIRD_IMAGE_PREFIX, UPSTREAM_ORIGIN};
use birdnet_common::Blob;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, trace};
use url::Url;

use crate::cache::CacheStorage;
use crate::fetch::Fetcher;
use crate::routing::{PassthroughReason, PathMatcher, Route, RouteDecision, RouteTable, Strategy};
use crate::strategy::{self, BackgroundTasks, CacheContext};
use crate::{FetchRequest, FetchResponse, ServiceWorkerError, ServiceWorkerId};

/// MIME type of serialized worker scripts.
pub const WORKER_SCRIPT_TYPE: &str = "application/json";

// ==================== Script ====================

/// Declarative worker script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerScript {
    /// Cache generation owned by this worker.
    pub cache_name: String,
    /// Routes evaluated in order.
    pub routes: Vec<Route>,
    /// Strategy for allowed requests no route matches.
    pub default_strategy: Strategy,
}

impl WorkerScript {
    /// Script for the BirdNET front-ends: statistics network-first, species
    /// images cache-first, everything else stale-while-revalidate.
    pub fn birdnet(cache_name: &str) -> Self {
        Self {
            cache_name: cache_name.to_string(),
            routes: vec![
                Route::new(
                    UPSTREAM_ORIGIN,
                    PathMatcher::Exact(API_PATH.to_string()),
                    Strategy::NetworkFirst,
                ),
                Route::new(
                    UPSTREAM_ORIGIN,
                    PathMatcher::Prefix(BIRD_IMAGE_PREFIX.to_string()),
                    Strategy::CacheFirst,
                ),
            ],
            default_strategy: Strategy::StaleWhileRevalidate,
        }
    }

    /// Compile the routing table for a page origin.
    pub fn compile(&self, page_url: &Url) -> RouteTable {
        RouteTable::new(page_url, self.routes.clone(), self.default_strategy)
    }

    /// Serialize into a blob.
    pub fn to_blob(&self) -> Result<Blob, ServiceWorkerError> {
        let data = serde_json::to_vec(self)
            .map_err(|e| ServiceWorkerError::ScriptError(e.to_string()))?;
        Ok(Blob::new(data, WORKER_SCRIPT_TYPE))
    }

    /// Parse a serialized script.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ServiceWorkerError> {
        let script: Self = serde_json::from_slice(bytes)
            .map_err(|e| ServiceWorkerError::ScriptError(e.to_string()))?;
        if script.cache_name.is_empty() {
            return Err(ServiceWorkerError::ScriptError(
                "cache name must not be empty".to_string(),
            ));
        }
        Ok(script)
    }
}

// ==================== Clients ====================

/// A client (controlled page).
#[derive(Debug, Clone)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Worker controlling this client.
    pub controller: Option<ServiceWorkerId>,
}

/// Clients API.
#[derive(Debug, Default)]
pub struct Clients {
    clients: HashMap<String, Client>,
}

impl Clients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a window client.
    pub fn add(&mut self, id: &str, url: Url) {
        self.clients.insert(
            id.to_string(),
            Client {
                id: id.to_string(),
                url,
                controller: None,
            },
        );
    }

    /// Get a client by ID.
    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    /// Remove a client.
    pub fn remove(&mut self, id: &str) -> Option<Client> {
        self.clients.remove(id)
    }

    /// Make `worker` the controller of every client inside `scope`.
    /// Returns the ids of clients whose controller changed.
    pub fn claim(&mut self, worker: ServiceWorkerId, scope: &Url) -> Vec<String> {
        let mut changed: Vec<String> = self
            .clients
            .values_mut()
            .filter(|c| c.url.as_str().starts_with(scope.as_str()))
            .filter(|c| c.controller != Some(worker))
            .map(|c| {
                c.controller = Some(worker);
                c.id.clone()
            })
            .collect();
        changed.sort();
        changed
    }
}

// ==================== Global Scope ====================

/// Result of a fetch event.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// `respondWith` was not called; the browser fetches normally.
    Passthrough(PassthroughReason),
    /// The worker supplied a response.
    Responded(FetchResponse),
}

impl FetchOutcome {
    /// The response, if the worker supplied one.
    pub fn response(&self) -> Option<&FetchResponse> {
        match self {
            FetchOutcome::Responded(r) => Some(r),
            FetchOutcome::Passthrough(_) => None,
        }
    }
}

/// A running worker instance.
pub struct WorkerGlobalScope {
    id: ServiceWorkerId,
    script: WorkerScript,
    routes: RouteTable,
    ctx: CacheContext,
    clients: Arc<RwLock<Clients>>,
    background: BackgroundTasks,
    skip_waiting: AtomicBool,
}

impl fmt::Debug for WorkerGlobalScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerGlobalScope")
            .field("id", &self.id)
            .field("cache_name", &self.script.cache_name)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

impl WorkerGlobalScope {
    /// Start a worker for `script` on the page at `page_url`.
    pub fn new(
        id: ServiceWorkerId,
        script: WorkerScript,
        page_url: &Url,
        caches: Arc<RwLock<CacheStorage>>,
        fetcher: Arc<dyn Fetcher>,
        clients: Arc<RwLock<Clients>>,
    ) -> Self {
        let routes = script.compile(page_url);
        let ctx = CacheContext::new(script.cache_name.clone(), caches, fetcher);
        Self {
            id,
            script,
            routes,
            ctx,
            clients,
            background: BackgroundTasks::new(),
            skip_waiting: AtomicBool::new(false),
        }
    }

    /// Worker id.
    pub fn id(&self) -> ServiceWorkerId {
        self.id
    }

    /// Cache generation owned by this worker.
    pub fn cache_name(&self) -> &str {
        &self.script.cache_name
    }

    /// Compiled routing table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// `self.skipWaiting()`.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::Relaxed);
    }

    /// Whether the worker asked to skip the waiting phase.
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::Relaxed)
    }

    /// `install` event: activate without waiting for old pages to close.
    pub async fn dispatch_install(&self) -> Result<(), ServiceWorkerError> {
        trace!(worker = ?self.id, "install");
        self.skip_waiting();
        Ok(())
    }

    /// `activate` event: delete every cache generation but ours, then claim
    /// the clients in `scope`. Returns the ids of newly controlled clients.
    pub async fn dispatch_activate(&self, scope: &Url) -> Result<Vec<String>, ServiceWorkerError> {
        let deleted = self.ctx.caches.write().await.retain_only(self.cache_name());
        for name in &deleted {
            info!(cache = %name, current = %self.cache_name(), "Deleted stale cache");
        }

        let claimed = self.clients.write().await.claim(self.id, scope);
        debug!(worker = ?self.id, claimed = claimed.len(), "Clients claimed");
        Ok(claimed)
    }

    /// `fetch` event.
    pub async fn dispatch_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, ServiceWorkerError> {
        match self.routes.route(request) {
            RouteDecision::Passthrough(reason) => {
                trace!(url = %request.url, %reason, "Not intercepted");
                Ok(FetchOutcome::Passthrough(reason))
            }
            RouteDecision::Handle(strategy) => {
                debug!(url = %request.url, %strategy, "respondWith");
                let response = strategy::apply(strategy, &self.ctx, request, &self.background).await?;
                Ok(FetchOutcome::Responded(response))
            }
        }
    }

    /// Wait for background revalidations to finish.
    pub async fn wait_until_idle(&self) {
        self.background.wait_idle().await;
    }
}
