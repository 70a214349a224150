//! Command-line companion for the BirdNET PWA utilities.
//!
//! ## Usage
//!
//! ```bash
//! # Print the manifest a front-end configuration produces
//! pwa-tool manifest live.json
//!
//! # Show the service worker routing table for a page
//! pwa-tool routes --page https://birds.example.org/live/
//!
//! # How would the worker treat this request?
//! pwa-tool classify https://birdnet.cornell.edu/api2/requeststats
//!
//! # Fetch through a live worker, twice
//! pwa-tool fetch https://birdnet.cornell.edu/api2/bird/Turdus_merula.webp --repeat 2
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use birdnet_common::birdnet::{format_live_data, API_URL};
use birdnet_common::{init_logging, BlobStore, LogConfig};
use birdnet_sw::{
    register_inline_service_worker, FetchOutcome, FetchRequest, HttpFetcher, ServiceWorkerContainer,
    WorkerConfig,
};
use clap::{Parser, Subcommand};
use http::Method;
use tracing::debug;
use url::Url;

mod inspect;

const DEFAULT_PAGE: &str = "https://birdnet.cornell.edu/live/";

#[derive(Parser)]
#[command(name = "pwa-tool")]
#[command(about = "Inspect BirdNET PWA manifests and service worker routing")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the manifest for a configuration file
    Manifest {
        /// JSON configuration (name, startUrl, ...)
        config: PathBuf,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the service worker routing table
    Routes {
        /// Page the worker is registered from
        #[arg(long, default_value = DEFAULT_PAGE)]
        page: Url,
        /// Cache generation name
        #[arg(long, default_value = "birdnet-v1")]
        cache_name: String,
    },

    /// Show how the worker handles a request
    Classify {
        #[arg(default_value = API_URL)]
        url: Url,
        #[arg(long, default_value = DEFAULT_PAGE)]
        page: Url,
        #[arg(short, long, default_value = "GET")]
        method: String,
    },

    /// Print the footer data-source line
    Footer {
        observations: f64,
        species: f64,
        #[arg(long)]
        hours: Option<f64>,
    },

    /// Fetch a URL through a registered worker
    Fetch {
        url: Url,
        #[arg(long, default_value = DEFAULT_PAGE)]
        page: Url,
        #[arg(long, default_value = "birdnet-v1")]
        cache_name: String,
        /// Number of times to fetch
        #[arg(short, long, default_value = "1")]
        repeat: usize,
        /// Network timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(log_config(cli.verbose, cli.json_logs));

    match cli.command {
        Commands::Manifest { config, output } => {
            let manifest = inspect::manifest_from_file(&config)?;
            let json = serde_json::to_string_pretty(&manifest)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Manifest written to: {}", path.display());
                }
                None => println!("{json}"),
            }
        }

        Commands::Routes { page, cache_name } => {
            let report = inspect::route_report(&page, &cache_name);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Classify { url, page, method } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|e| anyhow!("invalid method {method:?}: {e}"))?;
            let report = inspect::classify(&page, method, url);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Footer {
            observations,
            species,
            hours,
        } => {
            println!("{}", format_live_data(observations, species, hours));
        }

        Commands::Fetch {
            url,
            page,
            cache_name,
            repeat,
            timeout,
        } => {
            let client = http_client(Duration::from_secs(timeout))?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(fetch(client, page, url, cache_name, repeat))?;
        }
    }

    Ok(())
}

fn log_config(verbose: bool, json_logs: bool) -> LogConfig {
    let mut config = if verbose {
        LogConfig::debug()
    } else {
        LogConfig::cli()
    };
    if json_logs {
        config = LogConfig {
            level: config.level,
            ..LogConfig::production()
        };
    }
    config
}

fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("pwa-tool/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("building HTTP client")
}

async fn fetch(
    client: reqwest::Client,
    page: Url,
    url: Url,
    cache_name: String,
    repeat: usize,
) -> anyhow::Result<()> {
    let fetcher = Arc::new(HttpFetcher::with_client(client));
    let (container, _events) = ServiceWorkerContainer::new(page.clone(), fetcher, BlobStore::new(&page));

    let config = WorkerConfig::new(cache_name, "pwa-tool");
    register_inline_service_worker(Some(&container), &config)
        .await
        .ok_or_else(|| anyhow!("service worker registration failed for {page}"))?;

    let request = FetchRequest::get(url);
    for attempt in 1..=repeat {
        match container.handle_fetch(&request).await? {
            FetchOutcome::Responded(response) => println!(
                "#{attempt}: {} {} ({} bytes, {})",
                response.status,
                response.status_text,
                response.body.len(),
                if response.from_cache { "cache" } else { "network" }
            ),
            FetchOutcome::Passthrough(reason) => println!("#{attempt}: not intercepted: {reason}"),
        }
    }

    if let Some(worker) = container.controller(&page).await {
        debug!("Waiting for background revalidation");
        worker.wait_until_idle().await;
    }
    Ok(())
}
