//! The `photoshelf config` command for configuration management.

use clap::{Args, Subcommand};
use photoshelf_core::Config;
use std::path::PathBuf;

use super::expand_path;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show {
        /// Read this file instead of the default location
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show config file path
    Path,

    /// Write a config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Parse and validate a config file without using it
    Check {
        /// File to check (defaults to the standard location)
        file: Option<PathBuf>,
    },
}

fn resolve_file(file: Option<PathBuf>) -> PathBuf {
    file.map(|f| expand_path(&f))
        .unwrap_or_else(Config::default_path)
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { file } => {
            let config = match file {
                Some(file) => Config::load_from(&expand_path(&file))?,
                None => Config::load()?,
            };
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", Config::default_path().display());
        }

        ConfigCommand::Init { force } => {
            let path = Config::default_path();

            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, Config::default().to_toml()?)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }

        ConfigCommand::Check { file } => {
            let path = resolve_file(file);
            if !path.exists() {
                anyhow::bail!("No config file at: {}", path.display());
            }
            Config::load_from(&path)?;
            println!("{}: ok", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[resolver]\nparallel_requests = 0\n").unwrap();

        let args = ConfigArgs {
            command: ConfigCommand::Check { file: Some(path) },
        };
        let err = execute(args).await.unwrap_err();
        assert!(err.to_string().contains("parallel_requests"));
    }

    #[tokio::test]
    async fn test_check_accepts_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[changes]\nsubscriber_buffer = 8\n").unwrap();

        let args = ConfigArgs {
            command: ConfigCommand::Check { file: Some(path) },
        };
        assert!(execute(args).await.is_ok());
    }
}
