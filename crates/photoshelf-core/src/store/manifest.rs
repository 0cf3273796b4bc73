//! JSON library manifests.
//!
//! A manifest lists assets (pointing at image files on disk) and smart albums
//! and is loaded into a [`MemoryStore`]. Relative file paths resolve against
//! the manifest's directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::memory::{AssetData, MemoryStore};
use crate::error::{PhotoshelfError, Result};
use crate::types::{Asset, Collection, CollectionKind, CollectionSubtype};

/// One asset entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestAsset {
    #[serde(flatten)]
    pub asset: Asset,

    /// Image file backing the asset
    pub file: PathBuf,
}

/// One smart album entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestAlbum {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtype: CollectionSubtype,
    /// Count the store reports up front; omit for "unknown"
    #[serde(default)]
    pub estimated_count: Option<usize>,
    /// Member asset ids in album order
    #[serde(default)]
    pub assets: Vec<String>,
}

/// A media library description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryManifest {
    #[serde(default)]
    pub assets: Vec<ManifestAsset>,
    #[serde(default)]
    pub smart_albums: Vec<ManifestAlbum>,
}

impl LibraryManifest {
    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Build a store from this manifest.
    ///
    /// Asset files are read eagerly. A missing file is an error; a file that
    /// is present but undecodable fails later, at resolve time.
    pub fn into_store(self, base_dir: &Path) -> Result<MemoryStore> {
        let store = MemoryStore::new();
        for entry in self.assets {
            let path = if entry.file.is_absolute() {
                entry.file
            } else {
                base_dir.join(entry.file)
            };
            let bytes = std::fs::read(&path).map_err(|e| {
                PhotoshelfError::Io(std::io::Error::new(
                    e.kind(),
                    format!("{}: {}", path.display(), e),
                ))
            })?;
            store.add_asset(entry.asset, AssetData::from_bytes(bytes));
        }
        for album in self.smart_albums {
            store.add_collection(
                Collection {
                    local_id: album.id,
                    title: album.title,
                    kind: CollectionKind::SmartAlbum,
                    subtype: album.subtype,
                    estimated_count: album.estimated_count,
                },
                album.assets,
            );
        }
        tracing::debug!("Loaded library manifest from {:?}", base_dir);
        Ok(store)
    }

    /// Load a manifest file and build a store, resolving relative asset paths
    /// against the manifest's directory.
    pub fn open(path: &Path) -> Result<MemoryStore> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::load(path)?.into_store(base)
    }
}
