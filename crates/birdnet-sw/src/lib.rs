//! # BirdNET Service Worker
//!
//! The inline service worker shared by the BirdNET PWA front-ends.
//!
//! ## Features
//!
//! - **Registration**: inline scripts registered from `blob:` object URLs
//! - **Lifecycle**: install (skip waiting), activate (drop stale cache
//!   generations, claim clients), fetch
//! - **Routing**: origin allow-list plus a declarative route table
//! - **Strategies**: network-first, cache-first, stale-while-revalidate
//! - **Cache API**: `caches.open()`, `cache.put()`, `caches.match()`
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorkerContainer (navigator.serviceWorker)
//!     │
//!     └── ServiceWorkerRegistration
//!             ├── installing / waiting / active (ServiceWorker)
//!             │       └── WorkerGlobalScope
//!             │               ├── RouteTable
//!             │               └── CacheContext ── Fetcher
//!             └── scope
//!
//! CacheStorage (caches)
//!     └── Cache
//!             └── Request → Response
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use birdnet_common::BlobStore;
use bytes::Bytes;
use hashbrown::HashMap;
use http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};
use url::Url;

pub mod cache;
pub mod fetch;
pub mod register;
pub mod routing;
pub mod strategy;
pub mod worker;

#[cfg(test)]
mod testing;

pub use cache::{Cache, CacheEntry, CacheStorage};
pub use fetch::{Fetcher, HttpFetcher};
pub use register::{register_inline_service_worker, WorkerConfig};
pub use routing::{PassthroughReason, PathMatcher, Route, RouteDecision, RouteTable, Strategy};
pub use strategy::{BackgroundTasks, CacheContext};
pub use worker::{Clients, FetchOutcome, WorkerGlobalScope, WorkerScript};

// ==================== Errors ====================

/// Errors that can occur in service worker operations.
#[derive(Error, Debug, Clone)]
pub enum ServiceWorkerError {
    #[error("Registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Script error: {0}")]
    ScriptError(String),

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

// ==================== Types ====================

/// Unique identifier for a service worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServiceWorkerState {
    /// Initial state, script loaded.
    #[default]
    Parsed,
    /// Installing (install event).
    Installing,
    /// Installed but waiting for activation.
    Installed,
    /// Activating (activate event).
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Redundant (replaced or install failed).
    Redundant,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Request URL.
    pub url: Url,

    /// Request method.
    pub method: Method,

    /// Request headers.
    pub headers: HashMap<String, String>,
}

impl FetchRequest {
    /// Create a request.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            url,
            method,
            headers: HashMap::new(),
        }
    }

    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Add a header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Key under which the response is cached: the URL without fragment.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

/// A response produced by the network or the cache.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Status code.
    pub status: u16,

    /// Status text.
    pub status_text: String,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body. Cloning shares the buffer, so a copy can be cached
    /// while the original is returned.
    pub body: Bytes,

    /// Whether from cache.
    pub from_cache: bool,
}

impl FetchResponse {
    /// Create a network response with the given status.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: http::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            headers: HashMap::new(),
            body: body.into(),
            from_cache: false,
        }
    }

    /// Create a 200 response.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(200, body)
    }

    /// Create a response from cache entry.
    pub fn from_cache(entry: &CacheEntry) -> Self {
        Self {
            status: entry.status,
            status_text: entry.status_text.clone(),
            headers: entry.headers.clone(),
            body: entry.body.clone(),
            from_cache: true,
        }
    }

    /// Whether the status is 2xx.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ==================== Service Worker ====================

/// A service worker instance.
#[derive(Debug, Clone)]
pub struct ServiceWorker {
    /// Script URL.
    pub script_url: Url,

    /// Current state.
    pub state: ServiceWorkerState,

    /// Time of last state change.
    pub state_changed_at: Instant,

    /// Running instance.
    pub global: Arc<WorkerGlobalScope>,
}

impl ServiceWorker {
    /// Create a new service worker.
    pub fn new(script_url: Url, global: Arc<WorkerGlobalScope>) -> Self {
        Self {
            script_url,
            state: ServiceWorkerState::Parsed,
            state_changed_at: Instant::now(),
            global,
        }
    }

    /// Worker id.
    pub fn id(&self) -> ServiceWorkerId {
        self.global.id()
    }

    /// Set state.
    pub fn set_state(&mut self, state: ServiceWorkerState) {
        self.state = state;
        self.state_changed_at = Instant::now();
    }

    /// Check if active.
    pub fn is_active(&self) -> bool {
        self.state == ServiceWorkerState::Activated
    }
}

// ==================== Registration Options ====================

/// Options for service worker registration.
#[derive(Debug, Clone, Default)]
pub struct RegistrationOptions {
    /// Scope URL, resolved against the page URL.
    pub scope: Option<String>,
}

// ==================== Registration ====================

/// A service worker registration.
#[derive(Debug)]
pub struct ServiceWorkerRegistration {
    /// Scope URL.
    pub scope: Url,

    /// Installing worker.
    pub installing: Option<ServiceWorker>,

    /// Waiting worker (installed but not active).
    pub waiting: Option<ServiceWorker>,

    /// Active worker.
    pub active: Option<ServiceWorker>,
}

impl ServiceWorkerRegistration {
    /// Create a new registration.
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            installing: None,
            waiting: None,
            active: None,
        }
    }

    /// Get the active worker, once it has finished activating.
    pub fn get_active(&self) -> Option<&ServiceWorker> {
        self.active.as_ref().filter(|worker| worker.is_active())
    }

    /// Start installing a new worker.
    pub fn update(&mut self, mut worker: ServiceWorker) {
        worker.set_state(ServiceWorkerState::Installing);
        if let Some(mut previous) = self.installing.replace(worker) {
            previous.set_state(ServiceWorkerState::Redundant);
        }
    }

    /// Transition installing to waiting.
    pub fn install_complete(&mut self) {
        if let Some(mut worker) = self.installing.take() {
            worker.set_state(ServiceWorkerState::Installed);
            if let Some(mut previous) = self.waiting.replace(worker) {
                previous.set_state(ServiceWorkerState::Redundant);
            }
        }
    }

    /// Discard the installing worker after a failed install.
    pub fn install_failed(&mut self) {
        if let Some(mut worker) = self.installing.take() {
            worker.set_state(ServiceWorkerState::Redundant);
        }
    }

    /// Activate waiting worker.
    pub fn activate(&mut self) {
        if let Some(mut worker) = self.waiting.take() {
            worker.set_state(ServiceWorkerState::Activating);

            // Mark old active as redundant
            if let Some(mut old) = self.active.take() {
                old.set_state(ServiceWorkerState::Redundant);
            }

            worker.set_state(ServiceWorkerState::Activated);
            self.active = Some(worker);
        }
    }

    /// Unregister (mark as inactive).
    pub fn unregister(&mut self) {
        for slot in [&mut self.active, &mut self.waiting, &mut self.installing] {
            if let Some(mut worker) = slot.take() {
                worker.set_state(ServiceWorkerState::Redundant);
            }
        }
    }
}

// ==================== Service Worker Container ====================

/// Service worker events.
#[derive(Debug, Clone)]
pub enum ServiceWorkerEvent {
    /// State changed.
    StateChange {
        registration_scope: String,
        worker_id: ServiceWorkerId,
        new_state: ServiceWorkerState,
    },
    /// Update found.
    UpdateFound { registration_scope: String },
    /// Controller changed.
    ControllerChange { client_id: String },
}

/// Client id of the page that owns the container.
pub const PAGE_CLIENT_ID: &str = "page";

/// Service worker container (navigator.serviceWorker) of one page.
pub struct ServiceWorkerContainer {
    /// Page that owns the container.
    page_url: Url,

    /// Registrations by scope.
    registrations: Arc<RwLock<HashMap<String, ServiceWorkerRegistration>>>,

    /// Cache storage.
    pub caches: Arc<RwLock<CacheStorage>>,

    /// Clients.
    pub clients: Arc<RwLock<Clients>>,

    /// Network capability handed to workers.
    fetcher: Arc<dyn Fetcher>,

    /// Object URLs of the page.
    blobs: BlobStore,

    /// Event sender for state changes.
    event_tx: mpsc::UnboundedSender<ServiceWorkerEvent>,
}

impl ServiceWorkerContainer {
    /// Create the container for the page at `page_url`.
    pub fn new(
        page_url: Url,
        fetcher: Arc<dyn Fetcher>,
        blobs: BlobStore,
    ) -> (Self, mpsc::UnboundedReceiver<ServiceWorkerEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut clients = Clients::new();
        clients.add(PAGE_CLIENT_ID, page_url.clone());

        (
            Self {
                page_url,
                registrations: Arc::new(RwLock::new(HashMap::new())),
                caches: Arc::new(RwLock::new(CacheStorage::new())),
                clients: Arc::new(RwLock::new(clients)),
                fetcher,
                blobs,
                event_tx,
            },
            event_rx,
        )
    }

    /// Page that owns the container.
    pub fn page_url(&self) -> &Url {
        &self.page_url
    }

    /// Object URL store of the page.
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Register a service worker and run it through install and activate.
    /// Returns the registration scope.
    pub async fn register(
        &self,
        script_url: &Url,
        options: RegistrationOptions,
    ) -> Result<Url, ServiceWorkerError> {
        if script_url.origin() != self.page_url.origin() {
            return Err(ServiceWorkerError::SecurityError(format!(
                "script {} is not same-origin with {}",
                script_url, self.page_url
            )));
        }

        let scope = self.resolve_scope(options.scope.as_deref())?;
        let script = self.load_script(script_url)?;
        let scope_str = scope.to_string();

        let global = Arc::new(WorkerGlobalScope::new(
            ServiceWorkerId::new(),
            script,
            &self.page_url,
            self.caches.clone(),
            self.fetcher.clone(),
            self.clients.clone(),
        ));
        let worker_id = global.id();

        // Create or update registration
        let mut registrations = self.registrations.write().await;
        let registration = registrations
            .entry(scope_str.clone())
            .or_insert_with(|| ServiceWorkerRegistration::new(scope.clone()));

        registration.update(ServiceWorker::new(script_url.clone(), global.clone()));
        self.emit(ServiceWorkerEvent::UpdateFound {
            registration_scope: scope_str.clone(),
        });

        if let Err(e) = global.dispatch_install().await {
            registration.install_failed();
            self.emit_state(&scope_str, worker_id, ServiceWorkerState::Redundant);
            return Err(e);
        }
        registration.install_complete();
        self.emit_state(&scope_str, worker_id, ServiceWorkerState::Installed);

        if global.skip_waiting_requested() || registration.active.is_none() {
            registration.activate();
            let claimed = global.dispatch_activate(&scope).await?;
            self.emit_state(&scope_str, worker_id, ServiceWorkerState::Activated);
            for client_id in claimed {
                self.emit(ServiceWorkerEvent::ControllerChange { client_id });
            }
        }

        info!(scope = %scope_str, cache = %global.cache_name(), "Service worker registered");
        Ok(scope)
    }

    fn resolve_scope(&self, scope: Option<&str>) -> Result<Url, ServiceWorkerError> {
        let scope = match scope {
            Some(s) => self
                .page_url
                .join(s)
                .map_err(|e| ServiceWorkerError::RegistrationFailed(e.to_string()))?,
            None => {
                // Default scope: the page's directory.
                let mut scope = self.page_url.clone();
                let dir = self
                    .page_url
                    .path()
                    .rsplit_once('/')
                    .map(|(p, _)| format!("{p}/"))
                    .unwrap_or_else(|| "/".to_string());
                scope.set_path(&dir);
                scope.set_query(None);
                scope.set_fragment(None);
                scope
            }
        };
        if scope.origin() != self.page_url.origin() {
            return Err(ServiceWorkerError::SecurityError(format!(
                "scope {scope} is not same-origin with {}",
                self.page_url
            )));
        }
        Ok(scope)
    }

    fn load_script(&self, script_url: &Url) -> Result<WorkerScript, ServiceWorkerError> {
        let blob = self
            .blobs
            .resolve(script_url)
            .ok_or_else(|| ServiceWorkerError::NotFound(script_url.to_string()))?;
        debug!(url = %script_url, size = blob.size(), "Loaded worker script");
        WorkerScript::from_bytes(&blob.data)
    }

    /// Get the scope of the registration controlling a URL.
    pub async fn get_registration(&self, url: &Url) -> Option<Url> {
        let registrations = self.registrations.read().await;
        registrations
            .values()
            .filter(|r| url.as_str().starts_with(r.scope.as_str()))
            .max_by_key(|r| r.scope.as_str().len())
            .map(|r| r.scope.clone())
    }

    /// Get all registration scopes.
    pub async fn get_registrations(&self) -> Vec<String> {
        self.registrations.read().await.keys().cloned().collect()
    }

    /// Active worker controlling a URL, from the most specific scope.
    pub async fn controller(&self, url: &Url) -> Option<Arc<WorkerGlobalScope>> {
        let registrations = self.registrations.read().await;
        registrations
            .values()
            .filter(|r| url.as_str().starts_with(r.scope.as_str()))
            .filter_map(|r| r.get_active().map(|w| (r.scope.as_str().len(), w)))
            .max_by_key(|(len, _)| *len)
            .map(|(_, w)| w.global.clone())
    }

    /// Dispatch a fetch made by the page to its controller.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, ServiceWorkerError> {
        match self.controller(&self.page_url).await {
            Some(worker) => worker.dispatch_fetch(request).await,
            None => Ok(FetchOutcome::Passthrough(PassthroughReason::NoController)),
        }
    }

    /// Unregister a service worker.
    pub async fn unregister(&self, scope: &str) -> bool {
        let mut registrations = self.registrations.write().await;
        match registrations.remove(scope) {
            Some(mut registration) => {
                registration.unregister();
                true
            }
            None => false,
        }
    }

    fn emit(&self, event: ServiceWorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_state(&self, scope: &str, worker_id: ServiceWorkerId, new_state: ServiceWorkerState) {
        self.emit(ServiceWorkerEvent::StateChange {
            registration_scope: scope.to_string(),
            worker_id,
            new_state,
        });
    }
}
