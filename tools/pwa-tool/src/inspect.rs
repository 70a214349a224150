//! Reports printed by the CLI.

use std::path::Path;

use anyhow::{anyhow, Context};
use birdnet_common::PwaConfig;
use birdnet_pwa::{build_manifest, Manifest};
use birdnet_sw::{FetchRequest, Route, RouteDecision, Strategy, WorkerScript};
use http::Method;
use serde::Serialize;
use url::Url;

/// Routing table of the BirdNET worker for one page.
#[derive(Debug, Serialize)]
pub struct RouteReport {
    pub page_origin: String,
    pub cache_name: String,
    pub allowed_origins: Vec<String>,
    pub routes: Vec<Route>,
    pub default_strategy: Strategy,
}

/// How the worker treats one request.
#[derive(Debug, Serialize)]
pub struct Classification {
    pub url: String,
    pub method: String,
    pub intercepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Load a configuration file and build its manifest.
pub fn manifest_from_file(path: &Path) -> anyhow::Result<Manifest> {
    let config = PwaConfig::from_json_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    build_manifest(&config)
        .ok_or_else(|| anyhow!("{}: manifest needs both name and startUrl", path.display()))
}

pub fn route_report(page: &Url, cache_name: &str) -> RouteReport {
    let script = WorkerScript::birdnet(cache_name);
    let table = script.compile(page);
    RouteReport {
        page_origin: page.origin().ascii_serialization(),
        cache_name: script.cache_name.clone(),
        allowed_origins: table.allowed_origins().to_vec(),
        routes: table.routes().to_vec(),
        default_strategy: table.default_strategy(),
    }
}

pub fn classify(page: &Url, method: Method, url: Url) -> Classification {
    let table = WorkerScript::birdnet("inspect").compile(page);
    let request = FetchRequest::new(method, url);
    let (strategy, reason) = match table.route(&request) {
        RouteDecision::Handle(strategy) => (Some(strategy), None),
        RouteDecision::Passthrough(reason) => (None, Some(reason.to_string())),
    };
    Classification {
        url: request.url.to_string(),
        method: request.method.to_string(),
        intercepted: strategy.is_some(),
        strategy,
        reason,
    }
}
