//! Decoded image cache: composite keys and the pluggable backing store.

use moka::sync::Cache;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;
use crate::types::{Asset, ContentMode, DecodedImage, FetchRequest, Size};

/// Identifies one decoded rendition: (asset id, size, scale, fit mode).
///
/// Floats compare by bit pattern, so `2.0` and `2.0000001` are different keys.
#[derive(Debug, Clone)]
pub struct CacheKey {
    asset_id: String,
    target_size: Size,
    scale: f64,
    content_mode: ContentMode,
}

impl CacheKey {
    pub fn new(asset: &Asset, request: &FetchRequest) -> Self {
        Self {
            asset_id: asset.local_id.clone(),
            target_size: request.target_size,
            scale: request.scale,
            content_mode: request.content_mode,
        }
    }

    fn bits(&self) -> (u64, u64, u64) {
        (
            self.target_size.width.to_bits(),
            self.target_size.height.to_bits(),
            self.scale.to_bits(),
        )
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.asset_id == other.asset_id
            && self.bits() == other.bits()
            && self.content_mode == other.content_mode
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.asset_id.hash(state);
        self.bits().hash(state);
        self.content_mode.hash(state);
    }
}

/// Occupancy of an image cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of cached images
    pub entries: u64,
    /// Total weight in KiB of decoded pixels
    pub weighted_kib: u64,
}

/// Backing store for final decoded images.
///
/// Implementations own their eviction policy and must be safe for concurrent
/// use. Only final (non-degraded) images are inserted.
pub trait ImageCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Arc<DecodedImage>>;

    fn insert(&self, key: CacheKey, image: Arc<DecodedImage>);

    fn invalidate_all(&self);

    fn stats(&self) -> CacheStats;
}

/// In-memory cache weighted by decoded size, with idle expiry.
pub struct MemoryImageCache {
    cache: Cache<CacheKey, Arc<DecodedImage>>,
}

impl MemoryImageCache {
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity((config.max_bytes / 1024).max(1))
            .weigher(|_key: &CacheKey, value: &Arc<DecodedImage>| -> u32 {
                let kib = value.byte_size() / 1024;
                u32::try_from(kib).unwrap_or(u32::MAX).max(1)
            })
            .time_to_idle(Duration::from_secs(config.time_to_idle_secs))
            .build();
        Self { cache }
    }
}

impl ImageCache for MemoryImageCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<DecodedImage>> {
        self.cache.get(key)
    }

    fn insert(&self, key: CacheKey, image: Arc<DecodedImage>) {
        self.cache.insert(key, image);
    }

    fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks();
        CacheStats {
            entries: self.cache.entry_count(),
            weighted_kib: self.cache.weighted_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MediaKind, StorageLocality};
    use chrono::Utc;
    use image::DynamicImage;
    use std::collections::HashSet;

    fn asset(id: &str) -> Asset {
        let now = Utc::now();
        Asset {
            local_id: id.to_string(),
            kind: MediaKind::Image,
            locality: StorageLocality::Local,
            pixel_width: 10,
            pixel_height: 10,
            created_at: now,
            modified_at: now,
        }
    }

    fn request(w: f64, scale: f64, mode: ContentMode) -> FetchRequest {
        FetchRequest::new(Size::new(w, w), mode, scale)
    }

    #[test]
    fn test_key_covers_every_component() {
        let a = asset("a");
        let base = CacheKey::new(&a, &request(100.0, 2.0, ContentMode::AspectFit));

        let mut keys = HashSet::new();
        keys.insert(base.clone());
        keys.insert(CacheKey::new(&a, &request(100.0, 2.0, ContentMode::AspectFit)));
        assert_eq!(keys.len(), 1);

        keys.insert(CacheKey::new(&asset("b"), &request(100.0, 2.0, ContentMode::AspectFit)));
        keys.insert(CacheKey::new(&a, &request(50.0, 2.0, ContentMode::AspectFit)));
        keys.insert(CacheKey::new(&a, &request(100.0, 3.0, ContentMode::AspectFit)));
        keys.insert(CacheKey::new(&a, &request(100.0, 2.0, ContentMode::AspectFill)));
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn test_same_pixel_size_different_scale_are_distinct() {
        let a = asset("a");
        let one = CacheKey::new(&a, &request(200.0, 1.0, ContentMode::AspectFit));
        let two = CacheKey::new(&a, &request(100.0, 2.0, ContentMode::AspectFit));
        assert_ne!(one, two);
    }

    #[test]
    fn test_memory_cache_roundtrip_and_clear() {
        let cache = MemoryImageCache::new(&CacheConfig::default());
        let key = CacheKey::new(&asset("a"), &request(10.0, 1.0, ContentMode::AspectFit));
        assert!(cache.get(&key).is_none());

        let image = Arc::new(DecodedImage::new(DynamicImage::new_rgb8(64, 64), false));
        cache.insert(key.clone(), image);
        assert_eq!(cache.get(&key).unwrap().width, 64);
        assert_eq!(cache.stats().entries, 1);

        cache.invalidate_all();
        assert!(cache.get(&key).is_none());
    }
}
