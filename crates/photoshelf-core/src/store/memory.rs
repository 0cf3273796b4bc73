//! In-memory media store.
//!
//! Holds encoded image bytes per asset and decodes them on request, so the
//! whole pipeline can run without a platform photo library. Call counters,
//! delivery latency and failure injection make it the test double for every
//! pipeline stage.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{
    AssetResultSet, AssetResults, ChangeObserver, DeliveryInfo, DeliveryMode, FetchOptions,
    ImageDelivery, ImageRequestOptions, MediaStore, ObserverToken,
};
use crate::error::StoreError;
use crate::types::{
    Asset, ChangeDetails, ChangeEvent, Collection, CollectionKind, CollectionSubtype, ContentMode,
    DecodedImage, Size, StorageLocality,
};

/// Stored bytes for one asset.
#[derive(Debug, Clone)]
pub enum AssetData {
    /// Encoded image file contents (any format the `image` crate reads)
    Encoded(Arc<Vec<u8>>),
    /// Data that cannot be decoded
    Corrupt,
}

impl AssetData {
    /// Encode `image` as PNG.
    pub fn from_image(image: &DynamicImage) -> Result<Self, StoreError> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| StoreError::Other(format!("PNG encode failed: {}", e)))?;
        Ok(Self::Encoded(Arc::new(buffer.into_inner())))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::Encoded(Arc::new(bytes))
    }
}

/// Snapshot of the store's call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// `fetch_assets` + `fetch_assets_in` calls
    pub asset_queries: usize,
    /// `fetch_collections` calls
    pub collection_queries: usize,
    /// `request_image` calls
    pub image_requests: usize,
    /// Image requests abandoned by the caller before completion
    pub cancelled_requests: usize,
}

#[derive(Default)]
struct Counters {
    asset_queries: AtomicUsize,
    collection_queries: AtomicUsize,
    image_requests: AtomicUsize,
    cancelled_requests: AtomicUsize,
}

#[derive(Default)]
struct Behavior {
    delivery_delay: Duration,
    fail_queries: Option<StoreError>,
    fail_after: Option<usize>,
    refuse_observers: bool,
}

#[derive(Default)]
struct Library {
    assets: Vec<(Asset, AssetData)>,
    collections: Vec<(Collection, Vec<String>)>,
}

/// In-memory [`MediaStore`].
#[derive(Default)]
pub struct MemoryStore {
    library: Arc<RwLock<Library>>,
    observers: Mutex<HashMap<u64, Arc<dyn ChangeObserver>>>,
    next_token: AtomicU64,
    counters: Arc<Counters>,
    behavior: Mutex<Behavior>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset without notifying observers.
    pub fn add_asset(&self, asset: Asset, data: AssetData) {
        self.write_library().assets.push((asset, data));
    }

    /// Add a collection without notifying observers. Unknown member ids are
    /// ignored at query time.
    pub fn add_collection(&self, collection: Collection, members: Vec<String>) {
        self.write_library().collections.push((collection, members));
    }

    /// Add an asset and notify observers.
    pub fn insert_asset(&self, asset: Asset, data: AssetData) {
        let id = asset.local_id.clone();
        self.add_asset(asset, data);
        self.emit_change(ChangeEvent::new(ChangeDetails {
            inserted: vec![id],
            ..Default::default()
        }));
    }

    /// Remove an asset from the library and every collection, notifying
    /// observers. Returns `false` if the asset was not present.
    pub fn remove_asset(&self, local_id: &str) -> bool {
        let touched = {
            let mut library = self.write_library();
            let before = library.assets.len();
            library.assets.retain(|(a, _)| a.local_id != local_id);
            if library.assets.len() == before {
                return false;
            }
            let mut touched = Vec::new();
            for (collection, members) in library.collections.iter_mut() {
                let len = members.len();
                members.retain(|m| m != local_id);
                if members.len() != len {
                    touched.push(collection.local_id.clone());
                }
            }
            touched
        };
        self.emit_change(ChangeEvent::new(ChangeDetails {
            removed: vec![local_id.to_string()],
            collections: touched,
            ..Default::default()
        }));
        true
    }

    /// Deliver `event` to every registered observer.
    pub fn emit_change(&self, event: ChangeEvent) {
        let observers: Vec<Arc<dyn ChangeObserver>> =
            self.lock_observers().values().cloned().collect();
        tracing::trace!("Store change delivered to {} observer(s)", observers.len());
        for observer in observers {
            observer.library_did_change(event.clone());
        }
    }

    /// Wait this long before each non-preview delivery.
    pub fn set_delivery_delay(&self, delay: Duration) {
        self.lock_behavior().delivery_delay = delay;
    }

    /// Fail every query and image request with `error` (`None` to stop).
    pub fn fail_queries_with(&self, error: Option<StoreError>) {
        self.lock_behavior().fail_queries = error;
    }

    /// Let `n` queries succeed, then fail the rest as unreachable.
    pub fn fail_after_queries(&self, n: usize) {
        self.lock_behavior().fail_after = Some(n);
    }

    /// Refuse change observer registration.
    pub fn refuse_observers(&self, refuse: bool) {
        self.lock_behavior().refuse_observers = refuse;
    }

    pub fn observer_count(&self) -> usize {
        self.lock_observers().len()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            asset_queries: self.counters.asset_queries.load(Ordering::SeqCst),
            collection_queries: self.counters.collection_queries.load(Ordering::SeqCst),
            image_requests: self.counters.image_requests.load(Ordering::SeqCst),
            cancelled_requests: self.counters.cancelled_requests.load(Ordering::SeqCst),
        }
    }

    fn write_library(&self) -> std::sync::RwLockWriteGuard<'_, Library> {
        self.library.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<dyn ChangeObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_behavior(&self) -> std::sync::MutexGuard<'_, Behavior> {
        self.behavior.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count a query and apply failure injection.
    fn begin_query(&self, counter: &AtomicUsize) -> Result<(), StoreError> {
        counter.fetch_add(1, Ordering::SeqCst);
        let behavior = self.lock_behavior();
        if let Some(err) = &behavior.fail_queries {
            return Err(err.clone());
        }
        if let Some(limit) = behavior.fail_after {
            let made = self.counters.asset_queries.load(Ordering::SeqCst)
                + self.counters.collection_queries.load(Ordering::SeqCst);
            if made > limit {
                return Err(StoreError::Unreachable(format!(
                    "store went away after {} queries",
                    limit
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MediaStore for MemoryStore {
    async fn fetch_assets(&self, options: &FetchOptions) -> Result<AssetResults, StoreError> {
        self.begin_query(&self.counters.asset_queries)?;
        Ok(AssetResults::new(LiveQuery {
            library: Arc::clone(&self.library),
            scope: None,
            options: options.clone(),
        }))
    }

    async fn fetch_collections(
        &self,
        kind: CollectionKind,
        subtype: CollectionSubtype,
    ) -> Result<Vec<Collection>, StoreError> {
        self.begin_query(&self.counters.collection_queries)?;
        let library = self.library.read().unwrap_or_else(PoisonError::into_inner);
        Ok(library
            .collections
            .iter()
            .map(|(c, _)| c)
            .filter(|c| c.kind == kind)
            .filter(|c| subtype == CollectionSubtype::Any || c.subtype == subtype)
            .cloned()
            .collect())
    }

    async fn fetch_assets_in(
        &self,
        collection: &Collection,
        options: &FetchOptions,
    ) -> Result<AssetResults, StoreError> {
        self.begin_query(&self.counters.asset_queries)?;
        let exists = self
            .library
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .collections
            .iter()
            .any(|(c, _)| c.local_id == collection.local_id);
        if !exists {
            return Err(StoreError::NotFound(collection.local_id.clone()));
        }
        Ok(AssetResults::new(LiveQuery {
            library: Arc::clone(&self.library),
            scope: Some(collection.local_id.clone()),
            options: options.clone(),
        }))
    }

    async fn request_image(
        &self,
        asset: &Asset,
        pixel_size: Size,
        mode: ContentMode,
        options: &ImageRequestOptions,
    ) -> Result<mpsc::Receiver<ImageDelivery>, StoreError> {
        self.counters.image_requests.fetch_add(1, Ordering::SeqCst);
        let delay = {
            let behavior = self.lock_behavior();
            if let Some(err) = &behavior.fail_queries {
                return Err(err.clone());
            }
            behavior.delivery_delay
        };

        let stored = self
            .library
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .assets
            .iter()
            .find(|(a, _)| a.local_id == asset.local_id)
            .cloned();

        let (tx, rx) = mpsc::channel(4);
        let job = DecodeJob {
            stored,
            asset_id: asset.local_id.clone(),
            pixel_size,
            mode,
            options: *options,
            delay,
        };
        let counters = Arc::clone(&self.counters);
        tokio::spawn(async move {
            if job.run(&tx).await == JobOutcome::Cancelled {
                tracing::trace!("Image request for {} cancelled", job.asset_id);
                counters.cancelled_requests.fetch_add(1, Ordering::SeqCst);
            }
        });
        Ok(rx)
    }

    fn register_change_observer(
        &self,
        observer: Arc<dyn ChangeObserver>,
    ) -> Result<ObserverToken, StoreError> {
        if self.lock_behavior().refuse_observers {
            return Err(StoreError::Other(
                "change observer registration refused".to_string(),
            ));
        }
        let id = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.lock_observers().insert(id, observer);
        Ok(ObserverToken(id))
    }

    fn unregister_change_observer(&self, token: ObserverToken) {
        self.lock_observers().remove(&token.0);
    }
}

/// A live query over the library, evaluated on every access.
struct LiveQuery {
    library: Arc<RwLock<Library>>,
    scope: Option<String>,
    options: FetchOptions,
}

impl LiveQuery {
    fn evaluate(&self) -> Vec<Asset> {
        let library = self.library.read().unwrap_or_else(PoisonError::into_inner);
        let mut assets: Vec<Asset> = match &self.scope {
            None => library.assets.iter().map(|(a, _)| a.clone()).collect(),
            Some(scope) => library
                .collections
                .iter()
                .find(|(c, _)| &c.local_id == scope)
                .map(|(_, members)| {
                    members
                        .iter()
                        .filter_map(|id| library.assets.iter().find(|(a, _)| &a.local_id == id))
                        .map(|(a, _)| a.clone())
                        .collect()
                })
                .unwrap_or_default(),
        };
        if let Some(predicate) = &self.options.predicate {
            assets.retain(|a| predicate.matches(a));
        }
        if !self.options.sort.is_empty() {
            assets.sort_by(|a, b| {
                self.options
                    .sort
                    .iter()
                    .map(|d| d.compare(a, b))
                    .find(|o| o.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        assets
    }
}

impl AssetResultSet for LiveQuery {
    fn count(&self) -> usize {
        self.evaluate().len()
    }

    fn object_at(&self, index: usize) -> Option<Asset> {
        self.evaluate().into_iter().nth(index)
    }

    fn snapshot(&self) -> Vec<Asset> {
        self.evaluate()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum JobOutcome {
    Finished,
    Cancelled,
}

/// Background production of deliveries for one image request.
struct DecodeJob {
    stored: Option<(Asset, AssetData)>,
    asset_id: String,
    pixel_size: Size,
    mode: ContentMode,
    options: ImageRequestOptions,
    delay: Duration,
}

impl DecodeJob {
    async fn run(&self, tx: &mpsc::Sender<ImageDelivery>) -> JobOutcome {
        let Some((asset, data)) = &self.stored else {
            return send(tx, failure(format!("asset {} no longer exists", self.asset_id))).await;
        };

        if asset.locality == StorageLocality::RemoteOnly {
            if !self.options.network_access_allowed {
                let delivery = ImageDelivery::failed(DeliveryInfo {
                    in_cloud: true,
                    ..Default::default()
                });
                return send(tx, delivery).await;
            }
            // Simulated download of the original.
            if wait(tx, self.delay).await == JobOutcome::Cancelled {
                return JobOutcome::Cancelled;
            }
        }

        let bytes = match data {
            AssetData::Encoded(bytes) => Arc::clone(bytes),
            AssetData::Corrupt => return send(tx, failure("corrupt image data".into())).await,
        };

        let (width, height) = self.pixel_size.to_pixels();
        let preview = ((width / 4).max(1), (height / 4).max(1));

        match self.options.delivery_mode {
            DeliveryMode::Fast => self.deliver(tx, bytes, preview, false).await,
            DeliveryMode::HighQuality => {
                if wait(tx, self.delay).await == JobOutcome::Cancelled {
                    return JobOutcome::Cancelled;
                }
                self.deliver(tx, bytes, (width, height), false).await
            }
            DeliveryMode::Opportunistic => {
                if self.deliver(tx, Arc::clone(&bytes), preview, true).await
                    == JobOutcome::Cancelled
                {
                    return JobOutcome::Cancelled;
                }
                if wait(tx, self.delay).await == JobOutcome::Cancelled {
                    return JobOutcome::Cancelled;
                }
                self.deliver(tx, bytes, (width, height), false).await
            }
        }
    }

    /// Decode on the blocking pool and send the result (or the failure).
    async fn deliver(
        &self,
        tx: &mpsc::Sender<ImageDelivery>,
        bytes: Arc<Vec<u8>>,
        (width, height): (u32, u32),
        degraded: bool,
    ) -> JobOutcome {
        let mode = self.mode;
        let decoded = tokio::task::spawn_blocking(move || {
            decode_sync(&bytes, width, height, mode, degraded)
        })
        .await;

        let delivery = match decoded {
            Ok(Ok(image)) => ImageDelivery::image(image),
            Ok(Err(message)) => failure(message),
            Err(e) => failure(format!("decode task failed: {}", e)),
        };
        send(tx, delivery).await
    }
}

fn failure(message: String) -> ImageDelivery {
    ImageDelivery::failed(DeliveryInfo {
        error: Some(message),
        ..Default::default()
    })
}

async fn send(tx: &mpsc::Sender<ImageDelivery>, delivery: ImageDelivery) -> JobOutcome {
    match tx.send(delivery).await {
        Ok(()) => JobOutcome::Finished,
        Err(_) => JobOutcome::Cancelled,
    }
}

/// Sleep for `delay` unless the requester goes away first.
async fn wait(tx: &mpsc::Sender<ImageDelivery>, delay: Duration) -> JobOutcome {
    tokio::select! {
        _ = tx.closed() => JobOutcome::Cancelled,
        _ = tokio::time::sleep(delay) => JobOutcome::Finished,
    }
}

/// Decode `bytes` and resize to fit or fill `width` x `height`.
fn decode_sync(
    bytes: &[u8],
    width: u32,
    height: u32,
    mode: ContentMode,
    degraded: bool,
) -> Result<DecodedImage, String> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("Cannot detect image format: {}", e))?;
    let image = reader.decode().map_err(|e| e.to_string())?;

    let resized = match mode {
        ContentMode::AspectFit => image.resize(width, height, FilterType::Triangle),
        ContentMode::AspectFill => image.resize_to_fill(width, height, FilterType::Triangle),
    };
    Ok(DecodedImage::new(resized, degraded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{newest_first, MediaTypeFilter};
    use crate::types::{MediaKind, MediaTypeSelector};
    use chrono::{TimeZone, Utc};

    fn asset(id: &str, kind: MediaKind, created: i64) -> Asset {
        Asset {
            local_id: id.to_string(),
            kind,
            locality: StorageLocality::Local,
            pixel_width: 80,
            pixel_height: 40,
            created_at: Utc.timestamp_opt(created, 0).unwrap(),
            modified_at: Utc.timestamp_opt(created, 0).unwrap(),
        }
    }

    fn png() -> AssetData {
        AssetData::from_image(&DynamicImage::new_rgb8(80, 40)).unwrap()
    }

    fn smart(id: &str, estimated_count: Option<usize>) -> Collection {
        Collection {
            local_id: id.to_string(),
            title: id.to_string(),
            kind: CollectionKind::SmartAlbum,
            subtype: CollectionSubtype::Favorites,
            estimated_count,
        }
    }

    async fn collect(mut rx: mpsc::Receiver<ImageDelivery>) -> Vec<ImageDelivery> {
        let mut out = Vec::new();
        while let Some(d) = rx.recv().await {
            out.push(d);
        }
        out
    }

    #[tokio::test]
    async fn test_fetch_assets_filters_and_sorts() {
        let store = MemoryStore::new();
        store.add_asset(asset("old", MediaKind::Image, 1), png());
        store.add_asset(asset("clip", MediaKind::Video, 2), png());
        store.add_asset(asset("new", MediaKind::Image, 3), png());

        let options = FetchOptions::filtered(MediaTypeFilter::predicate_for(
            MediaTypeSelector::Image,
        ))
        .sorted_by(newest_first());
        let results = store.fetch_assets(&options).await.unwrap();

        let ids: Vec<String> = results.to_vec().into_iter().map(|a| a.local_id).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(store.stats().asset_queries, 1);
    }

    #[tokio::test]
    async fn test_results_are_live() {
        let store = MemoryStore::new();
        let results = store.fetch_assets(&FetchOptions::default()).await.unwrap();
        assert!(results.is_empty());

        store.add_asset(asset("a", MediaKind::Image, 1), png());
        assert_eq!(results.count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_assets_in_scopes_to_members() {
        let store = MemoryStore::new();
        store.add_asset(asset("a", MediaKind::Image, 1), png());
        store.add_asset(asset("b", MediaKind::Image, 2), png());
        let favorites = smart("fav", None);
        store.add_collection(favorites.clone(), vec!["b".into(), "missing".into()]);

        let results = store
            .fetch_assets_in(&favorites, &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.count(), 1);
        assert_eq!(results.first().unwrap().local_id, "b");

        let err = store
            .fetch_assets_in(&smart("nope", None), &FetchOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound("nope".into()));
    }

    #[tokio::test]
    async fn test_fail_after_queries() {
        let store = MemoryStore::new();
        store.fail_after_queries(1);
        assert!(store.fetch_assets(&FetchOptions::default()).await.is_ok());
        let err = store
            .fetch_collections(CollectionKind::SmartAlbum, CollectionSubtype::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_opportunistic_delivers_preview_then_final() {
        let store = MemoryStore::new();
        let a = asset("a", MediaKind::Image, 1);
        store.add_asset(a.clone(), png());

        let rx = store
            .request_image(
                &a,
                Size::new(40.0, 40.0),
                ContentMode::AspectFill,
                &ImageRequestOptions::default(),
            )
            .await
            .unwrap();
        let deliveries = collect(rx).await;

        assert_eq!(deliveries.len(), 2);
        assert!(deliveries[0].info.degraded);
        let last = deliveries[1].image.as_ref().unwrap();
        assert!(!last.degraded);
        assert_eq!((last.width, last.height), (40, 40));
    }

    #[tokio::test]
    async fn test_aspect_fit_preserves_ratio() {
        let store = MemoryStore::new();
        let a = asset("a", MediaKind::Image, 1);
        store.add_asset(a.clone(), png());

        let options = ImageRequestOptions {
            delivery_mode: DeliveryMode::HighQuality,
            ..Default::default()
        };
        let rx = store
            .request_image(&a, Size::new(40.0, 40.0), ContentMode::AspectFit, &options)
            .await
            .unwrap();
        let deliveries = collect(rx).await;

        assert_eq!(deliveries.len(), 1);
        let image = deliveries[0].image.as_ref().unwrap();
        assert_eq!((image.width, image.height), (40, 20));
    }

    #[tokio::test]
    async fn test_remote_only_needs_network() {
        let store = MemoryStore::new();
        let mut a = asset("cloud", MediaKind::Image, 1);
        a.locality = StorageLocality::RemoteOnly;
        store.add_asset(a.clone(), png());

        let rx = store
            .request_image(
                &a,
                Size::new(8.0, 8.0),
                ContentMode::AspectFit,
                &ImageRequestOptions::default(),
            )
            .await
            .unwrap();
        let deliveries = collect(rx).await;
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].image.is_none());
        assert!(deliveries[0].info.in_cloud);
    }

    #[tokio::test]
    async fn test_corrupt_data_reports_error() {
        let store = MemoryStore::new();
        let a = asset("bad", MediaKind::Image, 1);
        store.add_asset(a.clone(), AssetData::Corrupt);

        let rx = store
            .request_image(
                &a,
                Size::new(8.0, 8.0),
                ContentMode::AspectFit,
                &ImageRequestOptions::default(),
            )
            .await
            .unwrap();
        let deliveries = collect(rx).await;
        assert!(deliveries[0].info.error.is_some());
    }

    #[tokio::test]
    async fn test_observers_receive_mutations() {
        struct Recorder(Mutex<Vec<ChangeEvent>>);
        impl ChangeObserver for Recorder {
            fn library_did_change(&self, change: ChangeEvent) {
                self.0.lock().unwrap().push(change);
            }
        }

        let store = MemoryStore::new();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let token = store.register_change_observer(recorder.clone()).unwrap();

        store.insert_asset(asset("a", MediaKind::Image, 1), png());
        assert!(store.remove_asset("a"));
        assert!(!store.remove_asset("a"));

        store.unregister_change_observer(token);
        store.insert_asset(asset("b", MediaKind::Image, 2), png());

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].details().inserted, vec!["a".to_string()]);
        assert_eq!(seen[1].details().removed, vec!["a".to_string()]);
        assert_eq!(store.observer_count(), 0);
    }
}
