//! Media-type filtering: selector → query predicate and display title.

use std::cmp::Ordering;
use std::fmt;

use crate::types::{Asset, MediaKind, MediaTypeSelector};

/// Predicate matching assets whose kind is one of `kinds`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPredicate {
    kinds: Vec<MediaKind>,
}

impl QueryPredicate {
    /// Match any of the given media kinds.
    pub fn media_kinds(kinds: impl IntoIterator<Item = MediaKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn matches(&self, asset: &Asset) -> bool {
        self.kinds.contains(&asset.kind)
    }
}

impl fmt::Display for QueryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clauses: Vec<String> = self
            .kinds
            .iter()
            .map(|k| format!("mediaType == {}", k.code()))
            .collect();
        write!(f, "{}", clauses.join(" || "))
    }
}

/// Field an asset query can sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreationDate,
    ModificationDate,
}

/// One sort criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortDescriptor {
    pub key: SortKey,
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn descending(key: SortKey) -> Self {
        Self {
            key,
            ascending: false,
        }
    }

    /// Compare two assets under this descriptor.
    pub fn compare(&self, a: &Asset, b: &Asset) -> Ordering {
        let ord = match self.key {
            SortKey::CreationDate => a.created_at.cmp(&b.created_at),
            SortKey::ModificationDate => a.modified_at.cmp(&b.modified_at),
        };
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

/// Newest first: creation date descending, then modification date descending.
pub fn newest_first() -> Vec<SortDescriptor> {
    vec![
        SortDescriptor::descending(SortKey::CreationDate),
        SortDescriptor::descending(SortKey::ModificationDate),
    ]
}

/// Maps a [`MediaTypeSelector`] to its query predicate and title.
pub struct MediaTypeFilter;

impl MediaTypeFilter {
    pub fn predicate_for(selector: MediaTypeSelector) -> QueryPredicate {
        match selector {
            MediaTypeSelector::All => {
                QueryPredicate::media_kinds([MediaKind::Image, MediaKind::Video])
            }
            MediaTypeSelector::Image => QueryPredicate::media_kinds([MediaKind::Image]),
            MediaTypeSelector::Video => QueryPredicate::media_kinds([MediaKind::Video]),
        }
    }

    pub fn title_for(selector: MediaTypeSelector) -> &'static str {
        match selector {
            MediaTypeSelector::All => "images and videos",
            MediaTypeSelector::Image => "images",
            MediaTypeSelector::Video => "videos",
        }
    }
}
