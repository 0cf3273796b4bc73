//! Core data types for the Photoshelf query and caching layer.
//!
//! Assets and collections are owned by the media store; this layer only reads
//! them. Requests and decoded images are per-call values.

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::store::AssetResults;

/// Kind of media an asset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Numeric code used when rendering query predicates.
    pub fn code(self) -> u8 {
        match self {
            MediaKind::Image => 1,
            MediaKind::Video => 2,
        }
    }
}

/// Whether an asset's full data is on-device or must be fetched remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLocality {
    #[default]
    Local,
    RemoteOnly,
}

/// Opaque reference to one media item in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Stable store identifier
    pub local_id: String,

    /// Image or video
    pub kind: MediaKind,

    /// On-device or remote-only
    #[serde(default)]
    pub locality: StorageLocality,

    /// Native width in pixels
    pub pixel_width: u32,

    /// Native height in pixels
    pub pixel_height: u32,

    /// When the item was created
    pub created_at: DateTime<Utc>,

    /// When the item was last modified
    pub modified_at: DateTime<Utc>,
}

/// Selector for the media types an album query should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaTypeSelector {
    #[default]
    All,
    Image,
    Video,
}

/// Kind of collection in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// User-created album
    Album,
    /// System-defined album
    SmartAlbum,
}

/// Collection subtype filter. `Any` matches every subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionSubtype {
    #[default]
    Any,
    Favorites,
    RecentlyAdded,
    Videos,
    Screenshots,
    Selfies,
    Panoramas,
    Hidden,
    RecentlyDeleted,
    UserLibrary,
}

/// A collection as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Stable store identifier
    pub local_id: String,

    /// Display title
    pub title: String,

    /// Album or smart album
    pub kind: CollectionKind,

    /// Store-defined subtype
    pub subtype: CollectionSubtype,

    /// Item count if the store knows it ahead of time, `None` when unknown
    pub estimated_count: Option<usize>,
}

/// One materialized album: name, count, identifier, and its item results.
///
/// Equality is by identifier only. Records without an identifier are never
/// equal to anything, including themselves, so `AlbumRecord` is `PartialEq`
/// but deliberately not `Eq`.
#[derive(Debug, Clone)]
pub struct AlbumRecord {
    /// Display name
    pub name: String,

    /// Number of items in `results` at enumeration time
    pub count: usize,

    /// Collection identifier, absent for the synthetic all-items album
    pub local_id: Option<String>,

    /// Lazy handle to the album's items
    pub results: AssetResults,
}

impl PartialEq for AlbumRecord {
    fn eq(&self, other: &Self) -> bool {
        matches!((&self.local_id, &other.local_id), (Some(a), Some(b)) if a == b)
    }
}

/// A width/height pair in points or pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Multiply both dimensions by `factor`.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Round to whole pixels, never below 1x1.
    pub fn to_pixels(self) -> (u32, u32) {
        let w = self.width.round().clamp(1.0, u32::MAX as f64) as u32;
        let h = self.height.round().clamp(1.0, u32::MAX as f64) as u32;
        (w, h)
    }

    fn is_valid(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How an asset's native dimensions map into the requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    /// Scale to fit entirely inside the target, preserving aspect ratio
    #[default]
    AspectFit,
    /// Scale to cover the target, cropping the overflow
    AspectFill,
}

/// What resolution and fit an image request needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest {
    /// Display size in points
    pub target_size: Size,
    /// Fit policy
    pub content_mode: ContentMode,
    /// Points-to-pixels factor
    pub scale: f64,
}

impl FetchRequest {
    pub fn new(target_size: Size, content_mode: ContentMode, scale: f64) -> Self {
        Self {
            target_size,
            content_mode,
            scale,
        }
    }

    /// Target size in pixels (`target_size * scale`).
    pub fn pixel_size(&self) -> Size {
        self.target_size.scaled(self.scale)
    }

    /// Check that size and scale are positive finite numbers and that the
    /// pixel size stays within [`MAX_PIXEL_DIMENSION`] on each side.
    pub fn validate(&self) -> Result<(), String> {
        if !self.target_size.is_valid() {
            return Err(format!("target size {} must be positive", self.target_size));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(format!("scale {} must be positive", self.scale));
        }
        let pixels = self.pixel_size();
        let limit = f64::from(MAX_PIXEL_DIMENSION);
        if !pixels.is_valid() || pixels.width > limit || pixels.height > limit {
            return Err(format!(
                "pixel size {} exceeds {} per side",
                pixels, MAX_PIXEL_DIMENSION
            ));
        }
        Ok(())
    }
}

/// Largest width or height, in pixels, a [`FetchRequest`] may ask for.
pub const MAX_PIXEL_DIMENSION: u32 = 16_384;

/// Pixel data produced by resolving an asset.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Decoded pixels
    pub image: DynamicImage,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Low-resolution preview that a later delivery will replace
    pub degraded: bool,
}

impl DecodedImage {
    pub fn new(image: DynamicImage, degraded: bool) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            image,
            degraded,
        }
    }

    /// Approximate in-memory size of the pixel buffer.
    pub fn byte_size(&self) -> usize {
        self.image.as_bytes().len()
    }
}

/// What changed in the store. Passed through to subscribers unmodified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDetails {
    /// Assets added to the library
    pub inserted: Vec<String>,
    /// Assets removed from the library
    pub removed: Vec<String>,
    /// Assets whose content or metadata changed
    pub updated: Vec<String>,
    /// Collections whose membership or metadata changed
    pub collections: Vec<String>,
}

/// A store mutation event. Cheap to clone for fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent(Arc<ChangeDetails>);

impl ChangeEvent {
    pub fn new(details: ChangeDetails) -> Self {
        Self(Arc::new(details))
    }

    pub fn details(&self) -> &ChangeDetails {
        &self.0
    }
}
