//! Inline service worker registration.

use tracing::{error, info};
use url::Url;

use crate::worker::WorkerScript;
use crate::{RegistrationOptions, ServiceWorkerContainer, ServiceWorkerError};

/// Parameters of the inline worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Cache generation owned by the worker.
    pub cache_name: String,
    /// Prefix of the registration log lines.
    pub log_label: String,
}

impl WorkerConfig {
    /// Worker owning `cache_name`, logging under `log_label`.
    pub fn new(cache_name: impl Into<String>, log_label: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            log_label: log_label.into(),
        }
    }
}

/// Register the BirdNET worker from an object URL.
///
/// Does nothing when the host has no service worker support. Failures are
/// logged with the configured label and never returned; the page keeps
/// working uncached. Returns the registration scope on success.
pub async fn register_inline_service_worker(
    container: Option<&ServiceWorkerContainer>,
    config: &WorkerConfig,
) -> Option<Url> {
    let container = container?;

    match try_register(container, config).await {
        Ok(scope) => {
            info!(scope = %scope, "{}: Service Worker registered", config.log_label);
            Some(scope)
        }
        Err(e) => {
            error!("{}: Service Worker registration failed: {}", config.log_label, e);
            None
        }
    }
}

async fn try_register(
    container: &ServiceWorkerContainer,
    config: &WorkerConfig,
) -> Result<Url, ServiceWorkerError> {
    let blob = WorkerScript::birdnet(&config.cache_name).to_blob()?;
    let script_url = container
        .blobs()
        .create_object_url(blob)
        .map_err(|e| ServiceWorkerError::RegistrationFailed(e.to_string()))?;
    container
        .register(&script_url, RegistrationOptions::default())
        .await
}
