//! Item result handles.
//!
//! A handle is a reference to "the assets satisfying a query", not a copy of
//! them. Stores evaluate it on access, so a handle kept across a change
//! notification sees the updated library.

use std::fmt;
use std::sync::Arc;

use crate::types::Asset;

/// A lazy, thread-safe set of assets backing an [`AssetResults`] handle.
pub trait AssetResultSet: Send + Sync {
    /// Current number of matching assets.
    fn count(&self) -> usize;

    /// Asset at `index` in result order.
    fn object_at(&self, index: usize) -> Option<Asset>;

    /// All matching assets in result order.
    fn snapshot(&self) -> Vec<Asset>;
}

/// Cheaply clonable handle to an item result set.
#[derive(Clone)]
pub struct AssetResults {
    inner: Arc<dyn AssetResultSet>,
}

impl AssetResults {
    pub fn new(set: impl AssetResultSet + 'static) -> Self {
        Self {
            inner: Arc::new(set),
        }
    }

    /// A result set that never contains anything.
    pub fn empty() -> Self {
        Self::new(FixedResults(Vec::new()))
    }

    /// A result set over a fixed list of assets.
    pub fn fixed(assets: Vec<Asset>) -> Self {
        Self::new(FixedResults(assets))
    }

    pub fn count(&self) -> usize {
        self.inner.count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn get(&self, index: usize) -> Option<Asset> {
        self.inner.object_at(index)
    }

    pub fn first(&self) -> Option<Asset> {
        self.get(0)
    }

    pub fn to_vec(&self) -> Vec<Asset> {
        self.inner.snapshot()
    }
}

impl fmt::Debug for AssetResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetResults")
            .field("count", &self.count())
            .finish()
    }
}

struct FixedResults(Vec<Asset>);

impl AssetResultSet for FixedResults {
    fn count(&self) -> usize {
        self.0.len()
    }

    fn object_at(&self, index: usize) -> Option<Asset> {
        self.0.get(index).cloned()
    }

    fn snapshot(&self) -> Vec<Asset> {
        self.0.clone()
    }
}
