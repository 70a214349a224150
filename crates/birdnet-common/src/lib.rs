//! # BirdNET Common
//!
//! Common error types, logging configuration, page configuration and
//! object-URL storage shared by the BirdNET PWA utilities.
//!
//! ## Features
//!
//! - Unified error type for configuration and page-level failures
//! - Logging configuration and setup
//! - `PwaConfig`, the single configuration object handed to the initializer
//! - `BlobStore`, an in-memory `URL.createObjectURL()` equivalent
//! - BirdNET constants and the footer data-source text

use thiserror::Error;

pub mod birdnet;
pub mod blob;
pub mod config;
pub mod logging;

pub use blob::{Blob, BlobStore};
pub use config::PwaConfig;
pub use logging::{init_logging, LogConfig, LogFormat};

/// Unified error type for page-level operations.
#[derive(Error, Debug)]
pub enum PwaError {
    /// Configuration errors.
    #[error("Config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Errors while producing or resolving object URLs.
    #[error("Blob error: {0}")]
    Blob(String),

    /// JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PwaError {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config error with source.
    pub fn config_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a blob error.
    pub fn blob(message: impl Into<String>) -> Self {
        Self::Blob(message.into())
    }

    /// Get the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            PwaError::Config { .. } => "config",
            PwaError::Blob(_) => "blob",
            PwaError::Json(_) => "json",
            PwaError::Url(_) => "url",
            PwaError::Io(_) => "io",
        }
    }
}

/// Result type alias for page-level operations.
pub type Result<T> = std::result::Result<T, PwaError>;
