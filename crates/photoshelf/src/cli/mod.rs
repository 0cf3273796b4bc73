//! Command implementations.

pub mod albums;
pub mod config;
pub mod resolve;

use std::path::PathBuf;
use std::sync::Arc;

use photoshelf_core::store::LibraryManifest;
use photoshelf_core::{Config, PhotoService};

/// Expand `~` in a user-supplied path.
pub fn expand_path(path: &std::path::Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

/// Open a library manifest and start a service over it.
pub fn open_service(library: &std::path::Path, config: Config) -> anyhow::Result<PhotoService> {
    let path = expand_path(library);
    let store = LibraryManifest::open(&path)
        .map_err(|e| anyhow::anyhow!("Failed to open library {}: {}", path.display(), e))?;
    Ok(PhotoService::new(Arc::new(store), config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_leaves_relative_paths() {
        assert_eq!(
            expand_path(std::path::Path::new("lib/library.json")),
            PathBuf::from("lib/library.json")
        );
    }

    #[test]
    fn test_open_service_reports_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_service(&dir.path().join("missing.json"), Config::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("missing.json"));
    }
}
