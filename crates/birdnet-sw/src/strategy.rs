//! Caching strategies.
//!
//! Each strategy is a function over a [`CacheContext`]: a fetch capability
//! plus the shared cache storage and the name of the cache that receives
//! writes. Lookups match across all caches, as `caches.match()` does.
//!
//! None of the strategies applies a timeout. A network fetch that never
//! completes keeps the request pending.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::cache::{CacheEntry, CacheStorage};
use crate::fetch::Fetcher;
use crate::routing::Strategy;
use crate::{FetchRequest, FetchResponse, ServiceWorkerError};

/// Shared state the strategies operate on.
#[derive(Clone)]
pub struct CacheContext {
    /// Cache that receives writes.
    pub cache_name: String,
    /// Cache storage shared with the worker.
    pub caches: Arc<RwLock<CacheStorage>>,
    /// Network capability.
    pub fetcher: Arc<dyn Fetcher>,
}

impl CacheContext {
    /// Create a context.
    pub fn new(
        cache_name: impl Into<String>,
        caches: Arc<RwLock<CacheStorage>>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            cache_name: cache_name.into(),
            caches,
            fetcher,
        }
    }

    /// Look up a cached response.
    pub async fn lookup(&self, request: &FetchRequest) -> Option<FetchResponse> {
        let caches = self.caches.read().await;
        caches
            .match_request(&request.cache_key())
            .map(FetchResponse::from_cache)
    }

    /// Store a copy of a response in the current cache.
    pub async fn store(&self, request: &FetchRequest, response: &FetchResponse) {
        let key = request.cache_key();
        let entry = CacheEntry::from_response(request, response.clone());
        self.caches
            .write()
            .await
            .open(&self.cache_name)
            .put(&key, entry);
        trace!(url = %key, cache = %self.cache_name, "Cached response");
    }

    /// Fetch from the network and store a copy on success.
    async fn fetch_and_store(&self, request: &FetchRequest) -> Result<FetchResponse, ServiceWorkerError> {
        let response = self.fetcher.fetch(request).await?;
        self.store(request, &response).await;
        Ok(response)
    }
}

/// Background work started by a strategy that outlives the response.
///
/// Hosts call [`BackgroundTasks::wait_idle`] where a browser would keep the
/// worker alive for `waitUntil` promises.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    /// Create an empty task set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a spawned task.
    pub async fn track(&self, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of tasks still running.
    pub async fn pending(&self) -> usize {
        let mut handles = self.handles.lock().await;
        handles.retain(|h| !h.is_finished());
        handles.len()
    }

    /// Wait for every tracked task to finish.
    pub async fn wait_idle(&self) {
        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task failed");
            }
        }
    }
}

/// Network-first: fetch and cache; on network failure serve the cached copy.
pub async fn network_first(
    ctx: &CacheContext,
    request: &FetchRequest,
) -> Result<FetchResponse, ServiceWorkerError> {
    match ctx.fetch_and_store(request).await {
        Ok(response) => Ok(response),
        Err(err) => {
            debug!(url = %request.url, error = %err, "Network failed, trying cache");
            match ctx.lookup(request).await {
                Some(cached) => Ok(cached),
                None => Err(err),
            }
        }
    }
}

/// Cache-first: serve the cached copy without touching the network, else fetch and cache.
pub async fn cache_first(
    ctx: &CacheContext,
    request: &FetchRequest,
) -> Result<FetchResponse, ServiceWorkerError> {
    if let Some(cached) = ctx.lookup(request).await {
        trace!(url = %request.url, "Cache hit");
        return Ok(cached);
    }
    ctx.fetch_and_store(request).await
}

/// Stale-while-revalidate: serve the cached copy now and refresh it in the
/// background; without a cached copy, wait for the network.
///
/// Background refresh failures are dropped. They only leave the cached copy
/// as it was.
pub async fn stale_while_revalidate(
    ctx: &CacheContext,
    request: &FetchRequest,
    background: &BackgroundTasks,
) -> Result<FetchResponse, ServiceWorkerError> {
    let Some(cached) = ctx.lookup(request).await else {
        return ctx.fetch_and_store(request).await.map_err(|err| {
            debug!(url = %request.url, error = %err, "No cached copy and network failed");
            err
        });
    };

    let refresh_ctx = ctx.clone();
    let refresh_request = request.clone();
    let handle = tokio::spawn(async move {
        if let Err(err) = refresh_ctx.fetch_and_store(&refresh_request).await {
            debug!(url = %refresh_request.url, error = %err, "Background revalidation failed");
        }
    });
    background.track(handle).await;

    Ok(cached)
}

/// Serve a request with the given strategy.
pub async fn apply(
    strategy: Strategy,
    ctx: &CacheContext,
    request: &FetchRequest,
    background: &BackgroundTasks,
) -> Result<FetchResponse, ServiceWorkerError> {
    match strategy {
        Strategy::NetworkFirst => network_first(ctx, request).await,
        Strategy::CacheFirst => cache_first(ctx, request).await,
        Strategy::StaleWhileRevalidate => stale_while_revalidate(ctx, request, background).await,
    }
}
