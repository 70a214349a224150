//! Scripted fetcher for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;

use crate::fetch::Fetcher;
use crate::{FetchRequest, FetchResponse, ServiceWorkerError};

#[derive(Clone)]
enum Scripted {
    Respond(FetchResponse),
    Fail,
    Hang,
}

/// Fetcher answering from a per-URL script and counting calls.
#[derive(Default)]
pub(crate) struct MockFetcher {
    script: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, url: &str, body: &'static str) {
        self.respond_with(url, FetchResponse::ok(Bytes::from_static(body.as_bytes())));
    }

    pub(crate) fn respond_with(&self, url: &str, response: FetchResponse) {
        self.set(url, Scripted::Respond(response));
    }

    pub(crate) fn fail(&self, url: &str) {
        self.set(url, Scripted::Fail);
    }

    pub(crate) fn hang(&self, url: &str) {
        self.set(url, Scripted::Hang);
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn set(&self, url: &str, scripted: Scripted) {
        self.script.lock().unwrap().insert(url.to_string(), scripted);
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, ServiceWorkerError> {
        let key = request.cache_key();
        *self.calls.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        let scripted = self.script.lock().unwrap().get(&key).cloned();
        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail) | None => Err(ServiceWorkerError::NetworkError(format!(
                "connection refused: {key}"
            ))),
            Some(Scripted::Hang) => std::future::pending().await,
        }
    }
}
