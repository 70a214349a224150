//! # BirdNET PWA
//!
//! Page-side helpers shared by the BirdNET front-ends: a runtime-generated
//! web app manifest, the inline service worker registration, the install
//! prompt and the fullscreen toggle.
//!
//! [`init_common`] wires everything a page asks for and returns a
//! [`PwaApp`]; the host then feeds browser events to
//! [`PwaApp::handle_event`].

use std::rc::Rc;

use birdnet_common::{BlobStore, PwaConfig};
use birdnet_dom::{Document, DocumentEvent};
use birdnet_sw::{register_inline_service_worker, ServiceWorkerContainer, WorkerConfig};
use tracing::{debug, info, warn};
use url::Url;

pub mod footer;
pub mod fullscreen;
pub mod install;
pub mod manifest;

pub use footer::set_footer_data_source_text;
pub use fullscreen::{setup_fullscreen, FullscreenController};
pub use install::{setup_install_prompt, DeferredPrompt, InstallPromptController, InstallState, UserChoice};
pub use manifest::{build_manifest, set_dynamic_manifest, Manifest, ManifestIcon};

/// What the page offers the helpers.
pub struct PageHost {
    /// The page document.
    pub document: Rc<Document>,
    /// Object URLs of the page.
    pub blobs: BlobStore,
    /// `navigator.serviceWorker`, when supported.
    pub service_worker: Option<ServiceWorkerContainer>,
}

impl PageHost {
    /// Host without service worker support.
    pub fn new(document: Document, page_url: &Url) -> Self {
        Self {
            document: Rc::new(document),
            blobs: BlobStore::new(page_url),
            service_worker: None,
        }
    }

    /// Attach a service worker container. It shares the page's blob store.
    pub fn with_service_worker(mut self, container: ServiceWorkerContainer) -> Self {
        self.blobs = container.blobs().clone();
        self.service_worker = Some(container);
        self
    }
}

/// Browser events the helpers react to.
pub enum PageEvent {
    /// Click on the fullscreen button.
    FullscreenClick,
    /// `fullscreenchange` on the document.
    FullscreenChange,
    /// `beforeinstallprompt` on the window.
    BeforeInstallPrompt(Rc<dyn DeferredPrompt>),
    /// Click on the install button.
    InstallClick,
    /// `appinstalled` on the window.
    AppInstalled,
}

/// A page after [`init_common`].
pub struct PwaApp {
    host: PageHost,
    manifest_url: Option<Url>,
    worker_scope: Option<Url>,
    install: Option<InstallPromptController>,
    fullscreen: Option<FullscreenController>,
}

/// Set up the manifest, service worker, install prompt and fullscreen toggle.
///
/// - manifest when `name` and `startUrl` are set and the page has a manifest link
/// - service worker when `cacheName` and `logLabel` are set and the host supports it
/// - install prompt and fullscreen toggle when their elements exist
///
/// Nothing here fails the page: each missing piece is skipped.
pub async fn init_common(config: &PwaConfig, host: PageHost) -> PwaApp {
    let manifest_url = build_manifest(config).and_then(|manifest| {
        set_dynamic_manifest(&host.document, &host.blobs, &manifest).unwrap_or_else(|e| {
            warn!(error = %e, category = e.category(), "Failed to attach manifest");
            None
        })
    });

    let worker_scope = match config.worker_fields() {
        Some((cache_name, log_label)) => {
            let worker = WorkerConfig::new(cache_name, log_label);
            register_inline_service_worker(host.service_worker.as_ref(), &worker).await
        }
        None => None,
    };

    let install = setup_install_prompt(
        &host.document,
        config.prompt_id(),
        config.install_button_id(),
    );
    let fullscreen = setup_fullscreen(&host.document, config.fullscreen_button_id());

    info!(
        manifest = manifest_url.is_some(),
        service_worker = worker_scope.is_some(),
        install_prompt = install.is_some(),
        fullscreen = fullscreen.is_some(),
        "PWA initialized"
    );

    PwaApp {
        host,
        manifest_url,
        worker_scope,
        install,
        fullscreen,
    }
}

impl PwaApp {
    /// The page document.
    pub fn document(&self) -> &Rc<Document> {
        &self.host.document
    }

    /// The host the page was initialized with.
    pub fn host(&self) -> &PageHost {
        &self.host
    }

    /// Object URL of the attached manifest.
    pub fn manifest_url(&self) -> Option<&Url> {
        self.manifest_url.as_ref()
    }

    /// Scope of the registered service worker.
    pub fn worker_scope(&self) -> Option<&Url> {
        self.worker_scope.as_ref()
    }

    /// Install prompt controller, when the page has the prompt and button.
    pub fn install_prompt(&self) -> Option<&InstallPromptController> {
        self.install.as_ref()
    }

    /// Fullscreen toggle, when the page has the button.
    pub fn fullscreen(&self) -> Option<&FullscreenController> {
        self.fullscreen.as_ref()
    }

    /// Dispatch one browser event. Events for helpers the page lacks are ignored.
    pub async fn handle_event(&self, event: PageEvent) {
        match event {
            PageEvent::FullscreenClick => {
                if let Some(fullscreen) = &self.fullscreen {
                    fullscreen.toggle();
                }
            }
            PageEvent::FullscreenChange => {
                if let Some(fullscreen) = &self.fullscreen {
                    fullscreen.sync();
                }
            }
            PageEvent::BeforeInstallPrompt(prompt) => match &self.install {
                Some(install) => install.on_before_install_prompt(prompt),
                None => debug!("No install prompt UI, ignoring beforeinstallprompt"),
            },
            PageEvent::InstallClick => {
                if let Some(install) = &self.install {
                    install.on_install_click().await;
                }
            }
            PageEvent::AppInstalled => {
                if let Some(install) = &self.install {
                    install.on_app_installed();
                }
            }
        }
    }

    /// Dispatch the events the document queued. Returns how many were handled.
    pub async fn drain_document_events(&self) -> usize {
        let events = self.host.document.take_events();
        let count = events.len();
        for event in events {
            match event {
                DocumentEvent::FullscreenChange => self.handle_event(PageEvent::FullscreenChange).await,
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fullscreen::{ENTER_TITLE, EXIT_TITLE};
    use crate::install::tests::ScriptedPrompt;
    use crate::install::SHOW_CLASS;
    use async_trait::async_trait;
    use birdnet_sw::{FetchRequest, FetchResponse, Fetcher, ServiceWorkerError};
    use std::sync::Arc;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <link rel="manifest" id="manifest-placeholder">
</head>
<body>
  <div id="installPrompt" class="install-prompt">
    <span>Install BirdNET Live</span>
    <button id="installButton">Install</button>
  </div>
  <button id="fullscreenBtn"></button>
  <footer><span id="dataSource"></span></footer>
</body>
</html>"#;

    struct Offline;

    #[async_trait]
    impl Fetcher for Offline {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, ServiceWorkerError> {
            Err(ServiceWorkerError::NetworkError(format!("offline: {}", request.url)))
        }
    }

    fn page_url() -> Url {
        Url::parse("https://birds.example.org/live/index.html").unwrap()
    }

    fn host(with_worker: bool) -> PageHost {
        let host = PageHost::new(Document::parse_html(PAGE).unwrap(), &page_url());
        if with_worker {
            let (container, _events) =
                ServiceWorkerContainer::new(page_url(), Arc::new(Offline), BlobStore::new(&page_url()));
            host.with_service_worker(container)
        } else {
            host
        }
    }

    fn full_config() -> PwaConfig {
        PwaConfig::from_json_str(
            r#"{
                "name": "BirdNET Live",
                "startUrl": "./index.html",
                "cacheName": "birdnet-live-v1",
                "logLabel": "BirdNET Live"
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_init_wires_everything() {
        let app = init_common(&full_config(), host(true)).await;

        let manifest_url = app.manifest_url().unwrap();
        let link = app.document().get_element_by_id("manifest-placeholder").unwrap();
        assert_eq!(link.get_attribute("href").as_deref(), Some(manifest_url.as_str()));

        assert_eq!(app.worker_scope().unwrap().as_str(), "https://birds.example.org/live/");
        assert!(app.install_prompt().is_some());
        assert!(app.fullscreen().is_some());

        // Manifest and worker script share the page's object URLs.
        assert_eq!(app.host().blobs.len(), 2);
    }

    #[tokio::test]
    async fn test_init_without_config() {
        let app = init_common(&PwaConfig::default(), host(true)).await;

        assert!(app.manifest_url().is_none());
        assert!(app.worker_scope().is_none());
        assert!(app
            .document()
            .get_element_by_id("manifest-placeholder")
            .unwrap()
            .get_attribute("href")
            .is_none());
        // Default element ids still find the page's controls.
        assert!(app.install_prompt().is_some());
        assert!(app.fullscreen().is_some());
    }

    #[tokio::test]
    async fn test_init_without_service_worker_support() {
        let app = init_common(&full_config(), host(false)).await;

        assert!(app.manifest_url().is_some());
        assert!(app.worker_scope().is_none());
    }

    #[tokio::test]
    async fn test_custom_ids_missing_from_page() {
        let config = PwaConfig::from_json_str(
            r#"{"promptId":"banner","buttonId":"go","fullscreenButtonId":"fs"}"#,
        )
        .unwrap();
        let app = init_common(&config, host(false)).await;

        assert!(app.install_prompt().is_none());
        assert!(app.fullscreen().is_none());

        // Events for absent helpers are ignored.
        app.handle_event(PageEvent::FullscreenClick).await;
        app.handle_event(PageEvent::InstallClick).await;
        assert!(!app.document().is_fullscreen());
    }

    #[tokio::test]
    async fn test_fullscreen_round_trip_through_events() {
        let app = init_common(&PwaConfig::default(), host(false)).await;
        let button = app.document().get_element_by_id("fullscreenBtn").unwrap();

        app.handle_event(PageEvent::FullscreenClick).await;
        assert_eq!(app.drain_document_events().await, 1);
        assert_eq!(button.title().as_deref(), Some(EXIT_TITLE));
        assert_eq!(button.text_content(), "⛶");

        app.document().exit_fullscreen().unwrap();
        assert_eq!(app.drain_document_events().await, 1);
        assert_eq!(button.title().as_deref(), Some(ENTER_TITLE));
    }

    #[tokio::test]
    async fn test_install_flow_through_events() {
        let app = init_common(&PwaConfig::default(), host(false)).await;
        let container = app.document().get_element_by_id("installPrompt").unwrap();

        // Click before the browser offered installation.
        app.handle_event(PageEvent::InstallClick).await;
        assert!(!container.has_class(SHOW_CLASS));

        let prompt = ScriptedPrompt::new(UserChoice::Accepted);
        app.handle_event(PageEvent::BeforeInstallPrompt(prompt.clone())).await;
        assert!(container.has_class(SHOW_CLASS));
        assert!(container.has_class("install-prompt"));

        app.handle_event(PageEvent::InstallClick).await;
        assert!(!container.has_class(SHOW_CLASS));
        assert!(app.install_prompt().unwrap().is_resolved());
    }

    #[tokio::test]
    async fn test_app_installed_event() {
        let app = init_common(&PwaConfig::default(), host(false)).await;
        app.handle_event(PageEvent::BeforeInstallPrompt(ScriptedPrompt::new(UserChoice::Dismissed)))
            .await;

        app.handle_event(PageEvent::AppInstalled).await;

        let container = app.document().get_element_by_id("installPrompt").unwrap();
        assert!(!container.has_class(SHOW_CLASS));
    }
}
