//! Photoshelf CLI - browse and resolve media library albums.
//!
//! Runs the Photoshelf query and caching pipeline against a JSON library
//! manifest, which stands in for a device media store.
//!
//! # Usage
//!
//! ```bash
//! # List albums containing images
//! photoshelf albums --library ./library.json --media image
//!
//! # Resolve one asset to a 100x100pt @2x thumbnail
//! photoshelf resolve --library ./library.json --asset IMG_0001 \
//!     --width 100 --height 100 --scale 2 --output thumb.png
//!
//! # View configuration
//! photoshelf config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Photoshelf - media library album and image resolution.
#[derive(Parser, Debug)]
#[command(name = "photoshelf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List albums in a library manifest
    Albums(cli::albums::AlbumsArgs),

    /// Resolve one asset to an image at a given size
    Resolve(cli::resolve::ResolveArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match photoshelf_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `photoshelf config path`."
            );
            photoshelf_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Photoshelf v{}", photoshelf_core::VERSION);

    match cli.command {
        Commands::Albums(args) => cli::albums::execute(args, config).await,
        Commands::Resolve(args) => cli::resolve::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
