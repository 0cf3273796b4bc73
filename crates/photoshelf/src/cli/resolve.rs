//! The `photoshelf resolve` command.

use anyhow::Context;
use clap::{Args, ValueEnum};
use futures_util::StreamExt;
use photoshelf_core::{Config, ContentMode, FetchRequest, MediaTypeSelector, Size};
use std::path::PathBuf;

use super::{expand_path, open_service};

/// Content-fit mode.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum ModeArg {
    /// Fit inside the target size
    #[default]
    Fit,
    /// Fill the target size, cropping overflow
    Fill,
}

impl From<ModeArg> for ContentMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Fit => ContentMode::AspectFit,
            ModeArg::Fill => ContentMode::AspectFill,
        }
    }
}

/// Arguments for the `resolve` command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Library manifest (JSON)
    #[arg(short, long, env = "PHOTOSHELF_LIBRARY")]
    pub library: PathBuf,

    /// Asset identifier
    #[arg(short, long)]
    pub asset: String,

    /// Target width in points
    #[arg(long)]
    pub width: f64,

    /// Target height in points
    #[arg(long)]
    pub height: f64,

    /// Points-to-pixels scale factor
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,

    /// Content-fit mode
    #[arg(long, value_enum, default_value_t = ModeArg::Fit)]
    pub mode: ModeArg,

    /// Do not fetch remote-only originals
    #[arg(long)]
    pub offline: bool,

    /// Write the final image here (format from extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the resolve command.
pub async fn execute(args: ResolveArgs, mut config: Config) -> anyhow::Result<()> {
    if args.offline {
        config.resolver.allow_network_access = false;
    }
    let service = open_service(&args.library, config)?;

    let all_items = service
        .enumerate_albums(MediaTypeSelector::All)
        .await?
        .into_iter()
        .next()
        .unwrap_or_else(photoshelf_core::AssetResults::empty);
    let asset = all_items
        .to_vec()
        .into_iter()
        .find(|a| a.local_id == args.asset)
        .with_context(|| format!("No asset with id {}", args.asset))?;

    let request = FetchRequest::new(
        Size::new(args.width, args.height),
        args.mode.into(),
        args.scale,
    );
    let mut stream = service.resolve(&asset, request);
    let mut last = None;
    while let Some(item) = stream.next().await {
        let image = item?;
        println!(
            "{} {}x{}{}",
            asset.local_id,
            image.width,
            image.height,
            if image.degraded { " (preview)" } else { "" }
        );
        last = Some(image);
    }

    let image = last.context("Resolution finished without an image")?;
    if let Some(output) = args.output {
        let path = expand_path(&output);
        image
            .image
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Wrote {}", path.display());
    }
    Ok(())
}
