//! In-memory blobs addressed by `blob:` object URLs.
//!
//! This is the page-session equivalent of `URL.createObjectURL()`: content
//! generated at runtime (the manifest, the worker script) is stored here and
//! handed to consumers as a URL that lives as long as the page.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use hashbrown::HashMap;
use tracing::{debug, trace};
use url::Url;

use crate::{PwaError, Result};

/// An immutable chunk of data with a MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Blob contents.
    pub data: Bytes,
    /// MIME type (`application/json`, ...).
    pub content_type: String,
}

impl Blob {
    /// Create a new blob.
    pub fn new(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.into(),
        }
    }

    /// Create a JSON blob from a serializable value.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        let data = serde_json::to_vec(value)?;
        Ok(Self::new(data, "application/json"))
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Object URL registry for one page origin.
///
/// Cloning the store yields another handle to the same registry.
#[derive(Debug, Clone)]
pub struct BlobStore {
    origin: Url,
    blobs: Arc<RwLock<HashMap<String, Blob>>>,
}

impl BlobStore {
    /// Create a store for the page at `page_url`. Object URLs carry its origin.
    pub fn new(page_url: &Url) -> Self {
        Self {
            origin: page_url.clone(),
            blobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a blob and return its object URL.
    pub fn create_object_url(&self, blob: Blob) -> Result<Url> {
        let origin = self.origin.origin().ascii_serialization();
        let url = Url::parse(&format!("blob:{}/{}", origin, object_id()))?;

        debug!(url = %url, content_type = %blob.content_type, size = blob.size(), "Object URL created");

        self.blobs
            .write()
            .map_err(|_| PwaError::blob("blob registry poisoned"))?
            .insert(url.to_string(), blob);
        Ok(url)
    }

    /// Look up the blob behind an object URL.
    pub fn resolve(&self, url: &Url) -> Option<Blob> {
        trace!(url = %url, "Resolving object URL");
        if url.scheme() != "blob" {
            return None;
        }
        self.blobs.read().ok()?.get(url.as_str()).cloned()
    }

    /// Release an object URL. Returns whether it was registered.
    pub fn revoke_object_url(&self, url: &Url) -> bool {
        self.blobs
            .write()
            .map(|mut blobs| blobs.remove(url.as_str()).is_some())
            .unwrap_or(false)
    }

    /// Number of live object URLs.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    /// Whether no object URLs are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generate a UUID-like identifier for an object URL.
fn object_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    format!("{:016x}-{:04x}", nanos, COUNTER.fetch_add(1, Ordering::Relaxed))
}
