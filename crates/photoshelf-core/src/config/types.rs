//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};

use crate::store::DeliveryMode;

/// Album enumeration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumerationConfig {
    /// Skip the per-album query for smart albums whose item count the store
    /// already reports. Skipped albums are left out of the result.
    pub skip_known_count_albums: bool,

    /// Leave the last smart album in store order unvisited. The store lists
    /// a trailing terminator slot there.
    pub skip_last_smart_album: bool,

    /// Visit at most this many smart albums (in store order)
    pub smart_album_limit: Option<usize>,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            skip_known_count_albums: true,
            skip_last_smart_album: true,
            smart_album_limit: None,
        }
    }
}

/// Image resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Fetch remote-only originals over the network
    pub allow_network_access: bool,

    /// How the store should deliver previews and final images
    pub delivery_mode: DeliveryMode,

    /// Max concurrent resolutions in a batch request
    pub parallel_requests: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            allow_network_access: true,
            delivery_mode: DeliveryMode::Opportunistic,
            parallel_requests: 4,
        }
    }
}

/// Decoded image cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum total decoded bytes held
    pub max_bytes: u64,

    /// Evict entries not read for this many seconds
    pub time_to_idle_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024 * 1024,
            time_to_idle_secs: 600,
        }
    }
}

/// Change notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangesConfig {
    /// Events queued per subscriber before new ones are dropped for it
    pub subscriber_buffer: usize,
}

impl Default for ChangesConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
