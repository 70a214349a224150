//! Page configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{PwaError, Result};

/// Default id of the install prompt container.
pub const DEFAULT_PROMPT_ID: &str = "installPrompt";

/// Default id of the install button.
pub const DEFAULT_INSTALL_BUTTON_ID: &str = "installButton";

/// Default id of the fullscreen toggle button.
pub const DEFAULT_FULLSCREEN_BUTTON_ID: &str = "fullscreenBtn";

/// Configuration handed to the initializer by a front-end.
///
/// Every field is optional. Empty strings are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PwaConfig {
    /// Application name
    pub name: Option<String>,

    /// Short name shown under the home screen icon
    pub short_name: Option<String>,

    /// Manifest description
    pub description: Option<String>,

    /// URL the installed app opens
    pub start_url: Option<String>,

    /// Name of the service worker cache generation
    pub cache_name: Option<String>,

    /// Prefix for service worker log lines
    pub log_label: Option<String>,

    /// Id of the install prompt container
    pub prompt_id: Option<String>,

    /// Id of the install button
    pub button_id: Option<String>,

    /// Id of the fullscreen button
    pub fullscreen_button_id: Option<String>,
}

impl PwaConfig {
    /// Parse a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| PwaError::config_with_source("invalid configuration JSON", e))
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PwaError::config_with_source(format!("cannot read {}", path.display()), e)
        })?;
        Self::from_json_str(&contents)
    }

    /// `(name, start_url)` when both are present; gates manifest setup.
    pub fn manifest_fields(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.name)?, non_empty(&self.start_url)?))
    }

    /// `(cache_name, log_label)` when both are present; gates worker registration.
    pub fn worker_fields(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.cache_name)?, non_empty(&self.log_label)?))
    }

    /// Short name, if set.
    pub fn short_name(&self) -> Option<&str> {
        non_empty(&self.short_name)
    }

    /// Description, if set.
    pub fn description(&self) -> Option<&str> {
        non_empty(&self.description)
    }

    /// Install prompt container id.
    pub fn prompt_id(&self) -> &str {
        non_empty(&self.prompt_id).unwrap_or(DEFAULT_PROMPT_ID)
    }

    /// Install button id.
    pub fn install_button_id(&self) -> &str {
        non_empty(&self.button_id).unwrap_or(DEFAULT_INSTALL_BUTTON_ID)
    }

    /// Fullscreen button id.
    pub fn fullscreen_button_id(&self) -> &str {
        non_empty(&self.fullscreen_button_id).unwrap_or(DEFAULT_FULLSCREEN_BUTTON_ID)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
