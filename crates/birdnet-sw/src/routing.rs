//! Declarative request routing.
//!
//! A [`RouteTable`] is compiled once per worker from its script and the
//! page origin. Each intercepted request is checked against the origin
//! allow-list first; only then is a strategy picked from the first matching
//! route, falling back to the table's default strategy.

use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::FetchRequest;

/// Caching strategy applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Serve from cache if present, else fetch and populate.
    CacheFirst,
    /// Fetch, falling back to cache on network failure.
    NetworkFirst,
    /// Serve cached copy immediately and refresh it in the background.
    StaleWhileRevalidate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
        };
        f.write_str(name)
    }
}

/// How a route matches a URL path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum PathMatcher {
    /// Path equals the given string.
    Exact(String),
    /// Path starts with the given string.
    Prefix(String),
    /// Any path.
    Any,
}

impl PathMatcher {
    /// Check whether a path matches.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Exact(p) => path == p,
            PathMatcher::Prefix(p) => path.starts_with(p.as_str()),
            PathMatcher::Any => true,
        }
    }
}

/// One routing rule: requests to `origin` whose path matches use `strategy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// ASCII-serialized origin (`https://host[:port]`).
    pub origin: String,
    /// Path matcher.
    pub path: PathMatcher,
    /// Strategy for matching requests.
    pub strategy: Strategy,
}

impl Route {
    /// Create a route.
    pub fn new(origin: &str, path: PathMatcher, strategy: Strategy) -> Self {
        Self {
            origin: normalize_origin(origin),
            path,
            strategy,
        }
    }

    /// Check whether a URL matches this route.
    pub fn matches(&self, url: &Url) -> bool {
        url.origin().ascii_serialization() == self.origin && self.path.matches(url.path())
    }
}

/// Why a request is left to default browser handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassthroughReason {
    /// Only GET requests are handled.
    Method(Method),
    /// Origin is not on the allow-list.
    DisallowedOrigin(String),
    /// The page has no active worker.
    NoController,
}

impl fmt::Display for PassthroughReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassthroughReason::Method(m) => write!(f, "method {m} is not handled"),
            PassthroughReason::DisallowedOrigin(o) => write!(f, "origin {o} is not allowed"),
            PassthroughReason::NoController => f.write_str("page is not controlled"),
        }
    }
}

/// Routing decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Not intercepted.
    Passthrough(PassthroughReason),
    /// Intercepted and served with a strategy.
    Handle(Strategy),
}

/// Compiled routing table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    allowed_origins: Vec<String>,
    routes: Vec<Route>,
    default_strategy: Strategy,
}

impl RouteTable {
    /// Build a table. Route origins are added to the allow-list.
    pub fn new(page_origin: &Url, routes: Vec<Route>, default_strategy: Strategy) -> Self {
        let mut allowed_origins = vec![page_origin.origin().ascii_serialization()];
        for route in &routes {
            if !allowed_origins.contains(&route.origin) {
                allowed_origins.push(route.origin.clone());
            }
        }
        Self {
            allowed_origins,
            routes,
            default_strategy,
        }
    }

    /// Allowed origins, page origin first.
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    /// Routes in evaluation order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Strategy used when no route matches.
    pub fn default_strategy(&self) -> Strategy {
        self.default_strategy
    }

    /// Check whether a URL's origin is on the allow-list.
    pub fn is_allowed(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        self.allowed_origins.iter().any(|o| *o == origin)
    }

    /// Decide how to handle a request.
    pub fn route(&self, request: &FetchRequest) -> RouteDecision {
        if request.method != Method::GET {
            return RouteDecision::Passthrough(PassthroughReason::Method(request.method.clone()));
        }
        if !self.is_allowed(&request.url) {
            return RouteDecision::Passthrough(PassthroughReason::DisallowedOrigin(
                request.url.origin().ascii_serialization(),
            ));
        }
        let strategy = self
            .routes
            .iter()
            .find(|route| route.matches(&request.url))
            .map(|route| route.strategy)
            .unwrap_or(self.default_strategy);
        RouteDecision::Handle(strategy)
    }
}

/// Normalize an origin string through URL parsing; unparsable input is kept as-is.
fn normalize_origin(origin: &str) -> String {
    Url::parse(origin)
        .map(|u| u.origin().ascii_serialization())
        .unwrap_or_else(|_| origin.trim_end_matches('/').to_string())
}
