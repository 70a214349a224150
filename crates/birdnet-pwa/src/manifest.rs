//! Web app manifest generated at runtime.

use birdnet_common::birdnet::{ICON_URL, THEME_COLOR};
use birdnet_common::{Blob, BlobStore, PwaConfig, Result};
use birdnet_dom::Document;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

/// Id of the `<link rel="manifest">` element the manifest is attached to.
pub const MANIFEST_LINK_ID: &str = "manifest-placeholder";

/// A manifest icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIcon {
    /// Icon URL.
    pub src: String,
    /// Space-separated sizes, e.g. `512x512`.
    pub sizes: String,
    /// MIME type, serialized as `type`.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Space-separated purposes, e.g. `any maskable`.
    pub purpose: String,
}

/// Web app manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Full application name.
    pub name: String,
    /// Name shown under the home screen icon.
    pub short_name: String,
    /// Application description.
    pub description: String,
    /// URL opened on launch, relative to the manifest.
    pub start_url: String,
    /// Display mode (`standalone`).
    pub display: String,
    /// Splash screen background.
    pub background_color: String,
    /// Browser UI colour.
    pub theme_color: String,
    /// Preferred orientation.
    pub orientation: String,
    /// Application icons.
    pub icons: Vec<ManifestIcon>,
}

/// Build the manifest for a configuration.
///
/// Returns `None` unless both `name` and `startUrl` are set. Short name
/// and description fall back to the name.
pub fn build_manifest(config: &PwaConfig) -> Option<Manifest> {
    let (name, start_url) = config.manifest_fields()?;

    Some(Manifest {
        name: name.to_string(),
        short_name: config.short_name().unwrap_or(name).to_string(),
        description: config.description().unwrap_or(name).to_string(),
        start_url: start_url.to_string(),
        display: "standalone".to_string(),
        background_color: "#ffffff".to_string(),
        theme_color: THEME_COLOR.to_string(),
        orientation: "portrait".to_string(),
        icons: vec![ManifestIcon {
            src: ICON_URL.to_string(),
            sizes: "512x512".to_string(),
            mime_type: "image/png".to_string(),
            purpose: "any maskable".to_string(),
        }],
    })
}

/// Publish `manifest` as an object URL and point the manifest link at it.
///
/// Does nothing when the page has no manifest link. The object URL stays
/// valid for the lifetime of the page.
pub fn set_dynamic_manifest(
    document: &Document,
    blobs: &BlobStore,
    manifest: &Manifest,
) -> Result<Option<Url>> {
    let Some(link) = document.get_element_by_id(MANIFEST_LINK_ID) else {
        trace!("No manifest link, skipping manifest");
        return Ok(None);
    };

    let url = blobs.create_object_url(Blob::json(manifest)?)?;
    link.set_attribute("href", url.as_str());
    debug!(url = %url, name = %manifest.name, "Manifest attached");
    Ok(Some(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use birdnet_dom::Element;

    fn config(json: &str) -> PwaConfig {
        PwaConfig::from_json_str(json).unwrap()
    }

    fn page() -> Url {
        Url::parse("https://birds.example.org/live/index.html").unwrap()
    }

    #[test]
    fn test_requires_name_and_start_url() {
        assert!(build_manifest(&config(r#"{"name":"BirdNET Live"}"#)).is_none());
        assert!(build_manifest(&config(r#"{"startUrl":"./"}"#)).is_none());
        assert!(build_manifest(&config(r#"{"name":"","startUrl":"./"}"#)).is_none());
    }

    #[test]
    fn test_defaults() {
        let manifest =
            build_manifest(&config(r#"{"name":"BirdNET Live","startUrl":"./index.html"}"#)).unwrap();

        assert_eq!(manifest.short_name, "BirdNET Live");
        assert_eq!(manifest.description, "BirdNET Live");
        assert_eq!(manifest.start_url, "./index.html");
        assert_eq!(manifest.display, "standalone");
        assert_eq!(manifest.background_color, "#ffffff");
        assert_eq!(manifest.theme_color, "#1976d2");
        assert_eq!(manifest.orientation, "portrait");
        assert_eq!(manifest.icons.len(), 1);
        assert_eq!(manifest.icons[0].src, ICON_URL);
        assert_eq!(manifest.icons[0].purpose, "any maskable");
    }

    #[test]
    fn test_explicit_short_name_and_description() {
        let manifest = build_manifest(&config(
            r#"{"name":"BirdNET Live Dashboard","shortName":"BirdNET","description":"Live detections","startUrl":"./"}"#,
        ))
        .unwrap();

        assert_eq!(manifest.short_name, "BirdNET");
        assert_eq!(manifest.description, "Live detections");
    }

    #[test]
    fn test_json_field_names() {
        let manifest = build_manifest(&config(r#"{"name":"A","startUrl":"/"}"#)).unwrap();
        let json = serde_json::to_value(&manifest).unwrap();

        assert_eq!(json["short_name"], "A");
        assert_eq!(json["start_url"], "/");
        assert_eq!(json["icons"][0]["type"], "image/png");
        assert_eq!(json["icons"][0]["sizes"], "512x512");
    }

    #[test]
    fn test_set_dynamic_manifest() {
        let mut document = Document::new();
        let link = document.insert_element(
            Element::new("link", MANIFEST_LINK_ID).with_attribute("rel", "manifest"),
        );
        let blobs = BlobStore::new(&page());
        let manifest = build_manifest(&config(r#"{"name":"BirdNET Live","startUrl":"./"}"#)).unwrap();

        let url = set_dynamic_manifest(&document, &blobs, &manifest).unwrap().unwrap();

        assert_eq!(url.scheme(), "blob");
        assert_eq!(link.get_attribute("href").as_deref(), Some(url.as_str()));

        let blob = blobs.resolve(&url).unwrap();
        assert_eq!(blob.content_type, "application/json");
        let parsed: Manifest = serde_json::from_slice(&blob.data).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_missing_link_is_noop() {
        let document = Document::new();
        let blobs = BlobStore::new(&page());
        let manifest = build_manifest(&config(r#"{"name":"BirdNET Live","startUrl":"./"}"#)).unwrap();

        assert!(set_dynamic_manifest(&document, &blobs, &manifest).unwrap().is_none());
        assert!(blobs.is_empty());
    }
}
