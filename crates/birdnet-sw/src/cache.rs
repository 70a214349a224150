//! Cache API: named caches of request → response pairs.
//!
//! Entries never expire on their own. A cache generation disappears only as
//! a whole, when activation of a worker with a different cache name deletes
//! it.

use bytes::Bytes;
use hashbrown::HashMap;

use crate::{FetchRequest, FetchResponse};

/// A cached request/response pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response status text.
    pub status_text: String,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Bytes,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Build an entry from a request and a copy of its response.
    pub fn from_response(request: &FetchRequest, response: FetchResponse) -> Self {
        Self {
            url: request.cache_key(),
            method: request.method.to_string(),
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            body: response.body,
            cached_at: now_millis(),
        }
    }
}

/// A cache instance.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    /// Cached entries.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request.
    pub fn match_request(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(url)
    }

    /// Add or overwrite an entry.
    pub fn put(&mut self, url: &str, entry: CacheEntry) {
        self.entries.insert(url.to_string(), entry);
    }

    /// Delete entry.
    pub fn delete(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    /// Get all keys (URLs).
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache storage (caches global).
///
/// Caches are kept in creation order, which is the order
/// [`CacheStorage::match_request`] consults them in.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: Vec<Cache>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache (creates if doesn't exist).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        let index = match self.position(name) {
            Some(index) => index,
            None => {
                self.caches.push(Cache::new(name));
                self.caches.len() - 1
            }
        };
        &mut self.caches[index]
    }

    /// Get a cache without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.iter().find(|cache| cache.name == name)
    }

    /// Get a cache for modification without creating it.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Cache> {
        self.caches.iter_mut().find(|cache| cache.name == name)
    }

    /// Check if cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Delete a cache.
    pub fn delete(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.caches.remove(index);
                true
            }
            None => false,
        }
    }

    /// Get all cache names, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|cache| cache.name.clone()).collect();
        names.sort();
        names
    }

    /// Match across all caches, oldest first.
    pub fn match_request(&self, url: &str) -> Option<&CacheEntry> {
        self.caches
            .iter()
            .find_map(|cache| cache.match_request(url))
    }

    /// Delete every cache except `keep`. Returns the deleted names, sorted.
    pub fn retain_only(&mut self, keep: &str) -> Vec<String> {
        let stale: Vec<String> = self
            .keys()
            .into_iter()
            .filter(|name| name != keep)
            .collect();
        self.caches.retain(|cache| cache.name == keep);
        stale
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.caches.iter().position(|cache| cache.name == name)
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
