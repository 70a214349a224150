//! Network capability used by the caching strategies.

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use reqwest::Client;
use tracing::{debug, trace};

use crate::{FetchRequest, FetchResponse, ServiceWorkerError};

/// Something that can perform a network fetch.
///
/// An `Err` is a network failure (the JavaScript `fetch()` rejection). HTTP
/// error statuses are successful fetches of an error response.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request from the network.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, ServiceWorkerError>;
}

/// Fetcher backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client.
    pub fn new() -> Result<Self, ServiceWorkerError> {
        let client = Client::builder()
            .user_agent(concat!("birdnet-pwa/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceWorkerError::NetworkError(e.to_string()))?;
        Ok(Self { client })
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, ServiceWorkerError> {
        debug!(url = %request.url, method = %request.method, "Network fetch");

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ServiceWorkerError::NetworkError(e.to_string()))?;

        let status = response.status();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceWorkerError::NetworkError(e.to_string()))?;

        trace!(url = %request.url, status = status.as_u16(), body_len = body.len(), "Response received");

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
            from_cache: false,
        })
    }
}
