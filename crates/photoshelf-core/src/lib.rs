//! Photoshelf Core - media library query and image caching layer.
//!
//! Photoshelf sits between a device media store and a presentation layer. It
//! discovers albums, filters them by media type, resolves assets to decoded
//! images at a requested size, and republishes store changes so consumers can
//! refresh.
//!
//! # Architecture
//!
//! ```text
//! MediaTypeFilter → AlbumEnumerator → ImageResolver (cache / shared decode) → images
//! MediaStore change feed → ChangeBridge → N subscribers
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use photoshelf_core::{Config, FetchRequest, MediaTypeSelector, PhotoService};
//!
//! #[tokio::main]
//! async fn main() -> photoshelf_core::Result<()> {
//!     let store = std::sync::Arc::new(photoshelf_core::store::MemoryStore::new());
//!     let service = PhotoService::new(store, Config::load()?)?;
//!
//!     for album in service.albums(MediaTypeSelector::Image).await? {
//!         println!("{} ({})", album.name, album.count);
//!     }
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod albums;
pub mod changes;
pub mod config;
pub mod error;
pub mod filter;
pub mod resolver;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use albums::AlbumEnumerator;
pub use changes::{BridgeState, ChangeBridge, ChangeSubscription};
pub use config::Config;
pub use error::{
    AlbumQueryError, ConfigError, ImageDecodeError, PhotoshelfError, Result, StoreError,
    SubscriptionError,
};
pub use filter::{MediaTypeFilter, QueryPredicate};
pub use resolver::{ImageResolver, ImageResult, ImageStream};
pub use store::{AssetResults, MediaStore};
pub use types::{
    AlbumRecord, Asset, ChangeEvent, ContentMode, DecodedImage, FetchRequest, MediaKind,
    MediaTypeSelector, Size, StorageLocality, MAX_PIXEL_DIMENSION,
};

use futures_util::{Stream, StreamExt};
use std::sync::Arc;

use resolver::{CacheStats, MemoryImageCache};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Photoshelf service - the main entry point.
///
/// Owns one change-observer registration for its lifetime (released on
/// [`shutdown`](Self::shutdown) or drop) and one shared image cache.
pub struct PhotoService {
    config: Config,
    enumerator: AlbumEnumerator,
    resolver: ImageResolver,
    changes: ChangeBridge,
}

impl PhotoService {
    /// Create a service over `store` with an in-memory image cache.
    ///
    /// Fails with [`SubscriptionError`] if the store refuses the change
    /// observer.
    pub fn new(store: Arc<dyn MediaStore>, config: Config) -> Result<Self> {
        let cache = Arc::new(MemoryImageCache::new(&config.cache));
        Self::with_cache(store, cache, config)
    }

    /// Create a service with a custom image cache backend.
    pub fn with_cache(
        store: Arc<dyn MediaStore>,
        cache: Arc<dyn resolver::ImageCache>,
        config: Config,
    ) -> Result<Self> {
        tracing::debug!("Initializing Photoshelf v{}", VERSION);
        let changes = ChangeBridge::register(Arc::clone(&store), &config.changes)?;
        Ok(Self {
            enumerator: AlbumEnumerator::new(Arc::clone(&store), config.enumeration.clone()),
            resolver: ImageResolver::new(store, cache, &config.resolver),
            changes,
            config,
        })
    }

    /// Get a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Item result handles for every album, all-items album first.
    pub async fn enumerate_albums(
        &self,
        selector: MediaTypeSelector,
    ) -> std::result::Result<Vec<AssetResults>, AlbumQueryError> {
        self.enumerator.enumerate_albums(selector).await
    }

    /// Album records for every album, all-items album first.
    pub async fn albums(
        &self,
        selector: MediaTypeSelector,
    ) -> std::result::Result<Vec<AlbumRecord>, AlbumQueryError> {
        self.enumerator.albums(selector).await
    }

    /// Resolve one asset; see [`ImageResolver::resolve`].
    pub fn resolve(&self, asset: &Asset, request: FetchRequest) -> ImageStream {
        self.resolver.resolve(asset, request)
    }

    /// Resolve one asset to its final image.
    pub async fn resolve_final(&self, asset: &Asset, request: FetchRequest) -> ImageResult {
        self.resolver.resolve_final(asset, request).await
    }

    /// Resolve every asset in the image library to its final image.
    ///
    /// Enumerates the `image` all-items album, then resolves its assets with
    /// at most `resolver.parallel_requests` decodes in flight. Items arrive
    /// in completion order.
    pub async fn request_images(
        &self,
        request: FetchRequest,
    ) -> std::result::Result<impl Stream<Item = (String, ImageResult)> + '_, AlbumQueryError>
    {
        let albums = self.enumerate_albums(MediaTypeSelector::Image).await?;
        let assets = albums
            .into_iter()
            .next()
            .map(|all_items| all_items.to_vec())
            .unwrap_or_default();
        tracing::debug!("Requesting {} image(s) at {:?}", assets.len(), request);

        let parallel = self.config.resolver.parallel_requests.max(1);
        Ok(futures_util::stream::iter(assets)
            .map(move |asset| async move {
                let result = self.resolver.resolve_final(&asset, request).await;
                (asset.local_id, result)
            })
            .buffer_unordered(parallel))
    }

    /// Subscribe to store changes from now on.
    pub fn on_change(&self) -> ChangeSubscription {
        self.changes.on_change()
    }

    pub fn change_state(&self) -> BridgeState {
        self.changes.state()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache_stats()
    }

    pub fn clear_cache(&self) {
        self.resolver.clear_cache();
    }

    /// Release the change registration. Subscriptions finish; queries and
    /// resolution keep working.
    pub fn shutdown(&self) {
        self.changes.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::AssetData;
    use crate::store::MemoryStore;
    use crate::types::{ChangeDetails, Collection, CollectionKind, CollectionSubtype};
    use chrono::{TimeZone, Utc};
    use futures_util::StreamExt;
    use image::DynamicImage;

    fn asset(id: &str, kind: MediaKind, created: i64) -> Asset {
        Asset {
            local_id: id.to_string(),
            kind,
            locality: StorageLocality::Local,
            pixel_width: 32,
            pixel_height: 32,
            created_at: Utc.timestamp_opt(created, 0).unwrap(),
            modified_at: Utc.timestamp_opt(created, 0).unwrap(),
        }
    }

    fn library() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        let data = AssetData::from_image(&DynamicImage::new_rgb8(32, 32)).unwrap();
        store.add_asset(asset("p1", MediaKind::Image, 1), data.clone());
        store.add_asset(asset("p2", MediaKind::Image, 2), data.clone());
        store.add_asset(asset("v1", MediaKind::Video, 3), data.clone());
        store.add_asset(asset("broken", MediaKind::Image, 4), AssetData::Corrupt);
        store.add_collection(
            Collection {
                local_id: "fav".into(),
                title: "Favorites".into(),
                kind: CollectionKind::SmartAlbum,
                subtype: CollectionSubtype::Favorites,
                estimated_count: Some(5),
            },
            vec!["p1".into()],
        );
        store.add_collection(
            Collection {
                local_id: "recent".into(),
                title: "Recents".into(),
                kind: CollectionKind::SmartAlbum,
                subtype: CollectionSubtype::RecentlyAdded,
                estimated_count: None,
            },
            vec!["p1".into(), "p2".into(), "v1".into()],
        );
        store.add_collection(
            Collection {
                local_id: "end".into(),
                title: "".into(),
                kind: CollectionKind::SmartAlbum,
                subtype: CollectionSubtype::Any,
                estimated_count: None,
            },
            vec![],
        );
        Arc::new(store)
    }

    fn request() -> FetchRequest {
        FetchRequest::new(Size::new(8.0, 8.0), ContentMode::AspectFit, 2.0)
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_image_selector_scenario() {
        let store = library();
        let service = PhotoService::new(store.clone(), Config::default()).unwrap();

        let handles = service
            .enumerate_albums(MediaTypeSelector::Image)
            .await
            .unwrap();

        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].count(), 3);
        assert_eq!(handles[1].count(), 2);
        assert_eq!(store.stats().asset_queries, 2);
    }

    #[tokio::test]
    async fn test_request_images_reports_each_asset() {
        let store = library();
        let service = PhotoService::new(store.clone(), Config::default()).unwrap();

        let mut results: Vec<(String, ImageResult)> = service
            .request_images(request())
            .await
            .unwrap()
            .collect()
            .await;
        results.sort_by(|a, b| a.0.cmp(&b.0));

        let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["broken", "p1", "p2"]);
        assert!(matches!(
            results[0].1,
            Err(ImageDecodeError::Unavailable { .. })
        ));
        assert_eq!(results[1].1.as_ref().unwrap().width, 16);
        assert_eq!(service.cache_stats().entries, 2);
    }

    #[tokio::test]
    async fn test_refresh_after_change_sees_new_assets() {
        let store = library();
        let service = PhotoService::new(store.clone(), Config::default()).unwrap();
        let mut changes = service.on_change();

        let all = service
            .enumerate_albums(MediaTypeSelector::All)
            .await
            .unwrap()
            .remove(0);
        assert_eq!(all.count(), 4);

        let data = AssetData::from_image(&DynamicImage::new_rgb8(4, 4)).unwrap();
        store.insert_asset(asset("p3", MediaKind::Image, 9), data);

        let event = changes.recv().await.unwrap();
        assert_eq!(
            event.details(),
            &ChangeDetails {
                inserted: vec!["p3".into()],
                ..Default::default()
            }
        );
        assert_eq!(all.count(), 5);
    }

    #[tokio::test]
    async fn test_shutdown_delivers_to_nobody() {
        let store = library();
        let service = PhotoService::new(store.clone(), Config::default()).unwrap();
        let mut sub = service.on_change();

        service.shutdown();
        store.emit_change(ChangeEvent::new(ChangeDetails::default()));

        assert_eq!(service.change_state(), BridgeState::Unregistered);
        assert!(sub.recv().await.is_none());
        assert_eq!(store.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let store = library();
        let service = PhotoService::new(store.clone(), Config::default()).unwrap();
        assert_eq!(store.observer_count(), 1);
        drop(service);
        assert_eq!(store.observer_count(), 0);
    }

    #[test]
    fn test_registration_failure_is_fatal() {
        let store = library();
        store.refuse_observers(true);
        let result = PhotoService::new(store, Config::default());
        assert!(matches!(result, Err(PhotoshelfError::Subscription(_))));
    }
}
