//! Error types for the Photoshelf query and caching layer.
//!
//! Errors are organized by pipeline stage so the consuming layer can tell a
//! failed album query (show an empty/error list) from a failed decode (show a
//! placeholder) from a broken change subscription (the service is unusable).

use thiserror::Error;

/// Top-level error type for Photoshelf operations.
#[derive(Error, Debug)]
pub enum PhotoshelfError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Album enumeration failed
    #[error("Album query error: {0}")]
    AlbumQuery(#[from] AlbumQueryError),

    /// An asset could not be resolved to pixel data
    #[error("Image decode error: {0}")]
    ImageDecode(#[from] ImageDecodeError),

    /// Change notification could not be set up
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Media store failure outside of a specific pipeline stage
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failures reported by a media store implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached
    #[error("media store unreachable: {0}")]
    Unreachable(String),

    /// The user has not granted library access
    #[error("media library access denied")]
    PermissionDenied,

    /// A referenced asset or collection does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other store-side failure
    #[error("{0}")]
    Other(String),
}

/// Album enumeration failed. No partial results are delivered.
#[derive(Error, Debug, Clone)]
#[error("enumeration failed while querying {stage}: {source}")]
pub struct AlbumQueryError {
    /// Which query was running (`all items`, `smart albums`, `album <id>`)
    pub stage: String,
    /// Underlying store failure
    #[source]
    pub source: StoreError,
}

impl AlbumQueryError {
    pub(crate) fn new(stage: impl Into<String>, source: StoreError) -> Self {
        Self {
            stage: stage.into(),
            source,
        }
    }
}

/// An asset could not be resolved to pixel data.
///
/// `Clone` because a single shared decode fans its outcome out to every
/// request waiting on the same cache key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageDecodeError {
    /// Target size or scale is not a positive finite number
    #[error("invalid image request: {0}")]
    InvalidRequest(String),

    /// Decoding failed (corrupt data, revoked access, asset deleted)
    #[error("asset {asset_id} could not be decoded: {reason}")]
    Unavailable { asset_id: String, reason: String },

    /// Asset data lives only remotely and network access was not allowed
    #[error("asset {asset_id} is stored remotely and network access is not allowed")]
    RemoteOnly { asset_id: String },

    /// The store finished the request without a final image
    #[error("asset {asset_id} finished without a final image")]
    NoResult { asset_id: String },

    /// The store cancelled the request
    #[error("request for asset {asset_id} was cancelled")]
    Cancelled { asset_id: String },

    /// The store rejected the request outright
    #[error("store error for asset {asset_id}: {source}")]
    Store {
        asset_id: String,
        #[source]
        source: StoreError,
    },
}

/// Change-observer registration failed. Fatal to the service instance.
#[derive(Error, Debug, Clone)]
pub enum SubscriptionError {
    /// The store refused the observer registration
    #[error("change observer registration failed: {0}")]
    Registration(#[from] StoreError),
}

/// Convenience type alias for Photoshelf results.
pub type Result<T> = std::result::Result<T, PhotoshelfError>;
