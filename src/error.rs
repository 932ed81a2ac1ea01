//! Error types for the bakery service worker.

use thiserror::Error;

use crate::lifecycle::WorkerState;

/// Errors that can occur while handling worker events.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error from the network layer.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A URL could not be parsed or resolved against the app origin.
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL as given.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An app-shell asset could not be fetched during install.
    #[error("Failed to cache asset {url}: {reason}")]
    AssetFetch {
        /// URL of the asset that failed.
        url: String,
        /// Transport error or unexpected status.
        reason: String,
    },

    /// Cache storage failed.
    #[error("Cache storage error: {0}")]
    Cache(String),

    /// The platform refused to display or close a notification.
    #[error("Notification error: {0}")]
    Notification(String),

    /// A window client operation failed.
    #[error("Client error: {0}")]
    Clients(String),

    /// The worker was asked to move between incompatible lifecycle states.
    #[error("Invalid worker state transition: {from:?} -> {to:?}")]
    InvalidState {
        /// State the worker was in.
        from: WorkerState,
        /// State that was requested.
        to: WorkerState,
    },

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for worker operations.
pub type Result<T> = std::result::Result<T, Error>;
