//! Album enumeration: the all-items album plus queried smart albums.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::EnumerationConfig;
use crate::error::AlbumQueryError;
use crate::filter::{newest_first, MediaTypeFilter};
use crate::store::{AssetResults, FetchOptions, MediaStore};
use crate::types::{AlbumRecord, CollectionKind, CollectionSubtype, MediaTypeSelector};

/// Queries the store for albums matching a media-type selector.
pub struct AlbumEnumerator {
    store: Arc<dyn MediaStore>,
    config: EnumerationConfig,
}

impl AlbumEnumerator {
    pub fn new(store: Arc<dyn MediaStore>, config: EnumerationConfig) -> Self {
        Self { store, config }
    }

    /// Item result handles for every album, all-items album first.
    ///
    /// Completes with the full sequence or fails with no partial results.
    /// Dropping the future abandons the pass between store queries.
    pub async fn enumerate_albums(
        &self,
        selector: MediaTypeSelector,
    ) -> Result<Vec<AssetResults>, AlbumQueryError> {
        Ok(self
            .albums(selector)
            .await?
            .into_iter()
            .map(|album| album.results)
            .collect())
    }

    /// Album records for every album, all-items album first.
    ///
    /// The all-items record is named after the selector and has no
    /// identifier. Each smart album that gets queried contributes a record
    /// with its title, filtered count and identifier. A smart album listed
    /// twice under the same identifier is queried once.
    pub async fn albums(
        &self,
        selector: MediaTypeSelector,
    ) -> Result<Vec<AlbumRecord>, AlbumQueryError> {
        let predicate = MediaTypeFilter::predicate_for(selector);
        tracing::debug!("Enumerating albums for {:?} ({})", selector, predicate);

        let all_items = self
            .store
            .fetch_assets(&FetchOptions::filtered(predicate.clone()))
            .await
            .map_err(|e| AlbumQueryError::new("all items", e))?;

        let mut albums = vec![AlbumRecord {
            name: MediaTypeFilter::title_for(selector).to_string(),
            count: all_items.count(),
            local_id: None,
            results: all_items,
        }];

        let smart_albums = self
            .store
            .fetch_collections(CollectionKind::SmartAlbum, CollectionSubtype::Any)
            .await
            .map_err(|e| AlbumQueryError::new("smart albums", e))?;

        let visitable = if self.config.skip_last_smart_album {
            smart_albums.len().saturating_sub(1)
        } else {
            smart_albums.len()
        };
        let limit = self
            .config
            .smart_album_limit
            .map_or(visitable, |limit| limit.min(visitable));

        let mut seen = HashSet::new();
        for album in &smart_albums[..limit] {
            if self.config.skip_known_count_albums && album.estimated_count.is_some() {
                tracing::trace!("Skipping {} (count known up front)", album.local_id);
                continue;
            }
            if !seen.insert(album.local_id.as_str()) {
                tracing::warn!("Smart album {} listed twice, skipping", album.local_id);
                continue;
            }

            let options = FetchOptions::filtered(predicate.clone()).sorted_by(newest_first());
            let results = self
                .store
                .fetch_assets_in(album, &options)
                .await
                .map_err(|e| AlbumQueryError::new(format!("album {}", album.local_id), e))?;

            tracing::trace!("Queried {} ({} items)", album.local_id, results.count());
            albums.push(AlbumRecord {
                name: album.title.clone(),
                count: results.count(),
                local_id: Some(album.local_id.clone()),
                results,
            });
        }

        tracing::debug!(
            "Enumerated {} album(s) from {} smart album(s)",
            albums.len(),
            smart_albums.len()
        );
        Ok(albums)
    }
}
