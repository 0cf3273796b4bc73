//! The media store contract this layer consumes.
//!
//! The store is authoritative and read-only from our side. It supplies asset
//! and collection queries, decodes images on request, and pushes change
//! notifications to registered observers.
//!
//! - **results**: lazy, thread-safe item result handles
//! - **memory**: in-memory reference store (tests, CLI)
//! - **manifest**: JSON library manifest loaded into a memory store

pub mod manifest;
pub mod memory;
pub mod results;

pub use manifest::LibraryManifest;
pub use memory::{MemoryStore, StoreStats};
pub use results::{AssetResultSet, AssetResults};

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::StoreError;
use crate::filter::{QueryPredicate, SortDescriptor};
use crate::types::{
    Asset, ChangeEvent, Collection, CollectionKind, CollectionSubtype, ContentMode, DecodedImage,
    Size,
};

/// Filter and ordering for an asset query.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Only include matching assets; `None` includes everything
    pub predicate: Option<QueryPredicate>,
    /// Applied in order; empty keeps store order
    pub sort: Vec<SortDescriptor>,
}

impl FetchOptions {
    pub fn filtered(predicate: QueryPredicate) -> Self {
        Self {
            predicate: Some(predicate),
            sort: Vec::new(),
        }
    }

    pub fn sorted_by(mut self, sort: Vec<SortDescriptor>) -> Self {
        self.sort = sort;
        self
    }
}

/// How the store should deliver results for an image request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// A fast degraded preview first, then the final image
    #[default]
    Opportunistic,
    /// Only the final image
    HighQuality,
    /// A single fast result, possibly lower quality
    Fast,
}

/// Options attached to an image request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRequestOptions {
    /// Allow fetching remote-only originals. Without it remote-only assets
    /// resolve to no image.
    pub network_access_allowed: bool,
    pub delivery_mode: DeliveryMode,
}

/// Metadata accompanying each image delivery.
#[derive(Debug, Clone, Default)]
pub struct DeliveryInfo {
    /// The image is a preview and a better one follows
    pub degraded: bool,
    /// The data lives remotely and was not fetched
    pub in_cloud: bool,
    /// The store cancelled the request
    pub cancelled: bool,
    /// Store-side failure description
    pub error: Option<String>,
}

/// One callback-style result for an image request.
#[derive(Debug, Clone)]
pub struct ImageDelivery {
    pub image: Option<DecodedImage>,
    pub info: DeliveryInfo,
}

impl ImageDelivery {
    pub fn image(image: DecodedImage) -> Self {
        let degraded = image.degraded;
        Self {
            image: Some(image),
            info: DeliveryInfo {
                degraded,
                ..Default::default()
            },
        }
    }

    pub fn failed(info: DeliveryInfo) -> Self {
        Self { image: None, info }
    }
}

/// Receives store change notifications.
pub trait ChangeObserver: Send + Sync {
    fn library_did_change(&self, change: ChangeEvent);
}

/// Handle identifying one observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(pub u64);

/// Trait that media store backends implement.
///
/// Uses `async_trait` because the service holds the store as
/// `Arc<dyn MediaStore>`.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Query every asset in the library.
    async fn fetch_assets(&self, options: &FetchOptions) -> Result<AssetResults, StoreError>;

    /// List collections of a kind and subtype, in store-defined order.
    async fn fetch_collections(
        &self,
        kind: CollectionKind,
        subtype: CollectionSubtype,
    ) -> Result<Vec<Collection>, StoreError>;

    /// Query the assets of one collection.
    async fn fetch_assets_in(
        &self,
        collection: &Collection,
        options: &FetchOptions,
    ) -> Result<AssetResults, StoreError>;

    /// Start decoding `asset` at `pixel_size`.
    ///
    /// Deliveries arrive on the returned channel; it closes after the final
    /// one. Dropping the receiver cancels the request.
    async fn request_image(
        &self,
        asset: &Asset,
        pixel_size: Size,
        mode: ContentMode,
        options: &ImageRequestOptions,
    ) -> Result<mpsc::Receiver<ImageDelivery>, StoreError>;

    /// Register a change observer.
    fn register_change_observer(
        &self,
        observer: Arc<dyn ChangeObserver>,
    ) -> Result<ObserverToken, StoreError>;

    /// Release a registration. Unknown tokens are ignored.
    fn unregister_change_observer(&self, token: ObserverToken);
}
