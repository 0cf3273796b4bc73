//! The `photoshelf albums` command.

use clap::{Args, ValueEnum};
use photoshelf_core::{AlbumRecord, Config, MediaTypeSelector};
use serde::Serialize;
use std::path::PathBuf;

use super::open_service;

/// Media types to include.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum MediaArg {
    /// Images and videos
    #[default]
    All,
    /// Images only
    Image,
    /// Videos only
    Video,
}

impl From<MediaArg> for MediaTypeSelector {
    fn from(arg: MediaArg) -> Self {
        match arg {
            MediaArg::All => MediaTypeSelector::All,
            MediaArg::Image => MediaTypeSelector::Image,
            MediaArg::Video => MediaTypeSelector::Video,
        }
    }
}

/// Arguments for the `albums` command.
#[derive(Args, Debug)]
pub struct AlbumsArgs {
    /// Library manifest (JSON)
    #[arg(short, long, env = "PHOTOSHELF_LIBRARY")]
    pub library: PathBuf,

    /// Media types to include
    #[arg(short, long, value_enum, default_value_t = MediaArg::All)]
    pub media: MediaArg,

    /// Also query smart albums whose item count is known up front
    #[arg(long)]
    pub include_known: bool,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// One output row.
#[derive(Debug, Serialize)]
struct AlbumSummary {
    name: String,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    assets: Vec<String>,
}

impl From<&AlbumRecord> for AlbumSummary {
    fn from(record: &AlbumRecord) -> Self {
        Self {
            name: record.name.clone(),
            count: record.count,
            id: record.local_id.clone(),
            assets: record
                .results
                .to_vec()
                .into_iter()
                .map(|a| a.local_id)
                .collect(),
        }
    }
}

/// Execute the albums command.
pub async fn execute(args: AlbumsArgs, mut config: Config) -> anyhow::Result<()> {
    if args.include_known {
        config.enumeration.skip_known_count_albums = false;
    }
    let service = open_service(&args.library, config)?;
    let records = service.albums(args.media.into()).await?;
    let summaries: Vec<AlbumSummary> = records.iter().map(AlbumSummary::from).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for summary in &summaries {
            println!(
                "{:<24} {:>6}  {}",
                summary.name,
                summary.count,
                summary.id.as_deref().unwrap_or("-")
            );
        }
    }
    tracing::info!("Listed {} album(s)", summaries.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use photoshelf_core::store::AssetResults;

    #[test]
    fn test_media_arg_maps_to_selector() {
        assert_eq!(
            MediaTypeSelector::from(MediaArg::Image),
            MediaTypeSelector::Image
        );
        assert_eq!(
            MediaTypeSelector::from(MediaArg::default()),
            MediaTypeSelector::All
        );
    }

    #[test]
    fn test_summary_omits_missing_id() {
        let record = AlbumRecord {
            name: "images".into(),
            count: 0,
            local_id: None,
            results: AssetResults::empty(),
        };
        let json = serde_json::to_string(&AlbumSummary::from(&record)).unwrap();
        assert_eq!(json, r#"{"name":"images","count":0,"assets":[]}"#);
    }
}
