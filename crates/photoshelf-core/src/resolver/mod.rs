//! Asset → pixel data resolution through a size/scale-aware cache.
//!
//! Each request is addressed by a [`CacheKey`]. A cache hit yields one image.
//! On a miss, the first request for a key starts a single store decode (the
//! "flight") and every concurrent request for the same key follows it, so the
//! decoder runs once per key no matter how many callers are waiting.
//!
//! A flight publishes its progress on a `watch` channel: an optional degraded
//! preview, then either the final image (also inserted into the cache) or a
//! decode error. When every follower has dropped its stream the flight drops
//! its store request, which cancels the decode.

pub mod cache;

pub use cache::{CacheKey, CacheStats, ImageCache, MemoryImageCache};

use futures_util::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::watch;

use crate::config::ResolverConfig;
use crate::error::ImageDecodeError;
use crate::store::{ImageDelivery, ImageRequestOptions, MediaStore};
use crate::types::{Asset, DecodedImage, FetchRequest};

/// Item type of an [`ImageStream`].
pub type ImageResult = Result<Arc<DecodedImage>, ImageDecodeError>;

/// Stream of images for one request.
///
/// Yields zero or more degraded previews, then exactly one terminal item: the
/// final image or an error. Dropping the stream cancels the request.
pub struct ImageStream {
    inner: Pin<Box<dyn Stream<Item = ImageResult> + Send>>,
}

impl ImageStream {
    fn once(item: ImageResult) -> Self {
        Self {
            inner: Box::pin(futures_util::stream::once(async move { item })),
        }
    }

    fn follow(asset_id: String, mut rx: watch::Receiver<FlightState>) -> Self {
        let stream = async_stream::stream! {
            loop {
                let state = rx.borrow_and_update().clone();
                match state {
                    FlightState::Pending => {}
                    FlightState::Preview(image) => yield Ok(image),
                    FlightState::Ready(image) => {
                        yield Ok(image);
                        break;
                    }
                    FlightState::Failed(err) => {
                        yield Err(err);
                        break;
                    }
                }
                if rx.changed().await.is_err() {
                    yield Err(ImageDecodeError::Cancelled { asset_id });
                    break;
                }
            }
        };
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl Stream for ImageStream {
    type Item = ImageResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[derive(Debug, Clone)]
enum FlightState {
    Pending,
    Preview(Arc<DecodedImage>),
    Ready(Arc<DecodedImage>),
    Failed(ImageDecodeError),
}

type Flight = Arc<watch::Sender<FlightState>>;

/// Resolves assets to decoded images, sharing decodes and cached results.
#[derive(Clone)]
pub struct ImageResolver {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn MediaStore>,
    cache: Arc<dyn ImageCache>,
    in_flight: Mutex<HashMap<CacheKey, Flight>>,
    options: ImageRequestOptions,
}

impl ImageResolver {
    pub fn new(
        store: Arc<dyn MediaStore>,
        cache: Arc<dyn ImageCache>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                cache,
                in_flight: Mutex::new(HashMap::new()),
                options: ImageRequestOptions {
                    network_access_allowed: config.allow_network_access,
                    delivery_mode: config.delivery_mode,
                },
            }),
        }
    }

    /// Resolve `asset` at the request's size, scale and fit mode.
    ///
    /// Must be called within a Tokio runtime: a cache miss spawns the decode.
    pub fn resolve(&self, asset: &Asset, request: FetchRequest) -> ImageStream {
        if let Err(message) = request.validate() {
            return ImageStream::once(Err(ImageDecodeError::InvalidRequest(message)));
        }

        let key = CacheKey::new(asset, &request);
        if let Some(image) = self.inner.cache.get(&key) {
            tracing::trace!("Cache hit for {}", asset.local_id);
            return ImageStream::once(Ok(image));
        }

        let mut in_flight = self.inner.lock_in_flight();
        if let Some(flight) = in_flight.get(&key) {
            tracing::trace!("Joining in-flight decode for {}", asset.local_id);
            return ImageStream::follow(asset.local_id.clone(), flight.subscribe());
        }
        // A flight may have finished between the first lookup and the lock.
        if let Some(image) = self.inner.cache.get(&key) {
            return ImageStream::once(Ok(image));
        }

        tracing::trace!("Cache miss for {}, starting decode", asset.local_id);
        let (tx, rx) = watch::channel(FlightState::Pending);
        let flight = Arc::new(tx);
        in_flight.insert(key.clone(), Arc::clone(&flight));
        drop(in_flight);

        let inner = Arc::clone(&self.inner);
        let asset_owned = asset.clone();
        tokio::spawn(async move {
            inner.fly(asset_owned, request, key, flight).await;
        });

        ImageStream::follow(asset.local_id.clone(), rx)
    }

    /// Resolve and wait for the final image, skipping previews.
    pub async fn resolve_final(&self, asset: &Asset, request: FetchRequest) -> ImageResult {
        let mut stream = self.resolve(asset, request);
        let mut last = None;
        while let Some(item) = stream.next().await {
            last = Some(item?);
        }
        last.ok_or_else(|| ImageDecodeError::NoResult {
            asset_id: asset.local_id.clone(),
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.inner.cache.invalidate_all();
    }
}

impl Inner {
    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Flight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drive one store request to a terminal state.
    async fn fly(&self, asset: Asset, request: FetchRequest, key: CacheKey, flight: Flight) {
        let asset_id = asset.local_id.clone();
        let mut deliveries = match self
            .store
            .request_image(
                &asset,
                request.pixel_size(),
                request.content_mode,
                &self.options,
            )
            .await
        {
            Ok(rx) => rx,
            Err(source) => {
                let err = ImageDecodeError::Store { asset_id, source };
                self.land(&key, &flight, FlightState::Failed(err));
                return;
            }
        };

        loop {
            tokio::select! {
                _ = flight.closed() => {
                    if self.abandon(&key, &flight) {
                        tracing::debug!("Decode for {} abandoned by all requesters", asset_id);
                        return;
                    }
                }
                delivery = deliveries.recv() => {
                    let state = match delivery {
                        Some(delivery) => classify(&asset_id, delivery),
                        None => FlightState::Failed(ImageDecodeError::NoResult {
                            asset_id: asset_id.clone(),
                        }),
                    };
                    let terminal = match &state {
                        FlightState::Pending | FlightState::Preview(_) => false,
                        FlightState::Ready(image) => {
                            self.cache.insert(key.clone(), Arc::clone(image));
                            true
                        }
                        FlightState::Failed(err) => {
                            tracing::warn!("Image decode failed: {}", err);
                            true
                        }
                    };
                    if terminal {
                        self.land(&key, &flight, state);
                        return;
                    }
                    flight.send_replace(state);
                }
            }
        }
    }

    /// Publish the terminal state, then retire the flight.
    fn land(&self, key: &CacheKey, flight: &Flight, state: FlightState) {
        flight.send_replace(state);
        let mut in_flight = self.lock_in_flight();
        if in_flight.get(key).is_some_and(|f| Arc::ptr_eq(f, flight)) {
            in_flight.remove(key);
        }
    }

    /// Retire the flight if nobody is following it. A request may have
    /// joined after `closed()` fired, in which case the flight continues.
    fn abandon(&self, key: &CacheKey, flight: &Flight) -> bool {
        let mut in_flight = self.lock_in_flight();
        if flight.receiver_count() > 0 {
            return false;
        }
        if in_flight.get(key).is_some_and(|f| Arc::ptr_eq(f, flight)) {
            in_flight.remove(key);
        }
        true
    }
}

fn classify(asset_id: &str, delivery: ImageDelivery) -> FlightState {
    let ImageDelivery { image, info } = delivery;
    match image {
        Some(image) if image.degraded || info.degraded => FlightState::Preview(Arc::new(image)),
        Some(image) => FlightState::Ready(Arc::new(image)),
        None if info.cancelled => FlightState::Failed(ImageDecodeError::Cancelled {
            asset_id: asset_id.to_string(),
        }),
        None if info.in_cloud => FlightState::Failed(ImageDecodeError::RemoteOnly {
            asset_id: asset_id.to_string(),
        }),
        None => FlightState::Failed(ImageDecodeError::Unavailable {
            asset_id: asset_id.to_string(),
            reason: info
                .error
                .unwrap_or_else(|| "store returned no image".to_string()),
        }),
    }
}
