//! Relic CLI - cross-language code relationship graph extraction
//!
//! # Usage
//!
//! ```bash
//! # Full extraction of the current tree
//! relic extract
//!
//! # Incremental sync against the last indexed revision
//! relic sync
//!
//! # Surgical re-extraction of one file
//! relic update src/legacy/OrderForm.aspx
//!
//! # Show indexing state
//! relic status
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;
mod progress;

/// Relic - code relationship graph extraction for legacy codebases
#[derive(Parser, Debug)]
#[command(name = "relic")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Source tree root (defaults to the current directory)
    #[arg(long, short = 'r', global = true, env = "RELIC_ROOT")]
    root: Option<PathBuf>,

    /// Output directory for the graph store (overrides config)
    #[arg(long, short = 'o', global = true, env = "RELIC_OUTPUT")]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,
}

impl GlobalOptions {
    fn root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn to_config_overrides(&self) -> relic_config::ConfigOverrides {
        relic_config::ConfigOverrides {
            output_dir: self.output.clone(),
            ..Default::default()
        }
    }

    fn load_config(&self) -> Result<relic_config::RelicConfig> {
        let loader = relic_config::ConfigLoader::new();
        Ok(loader.load(&self.root(), Some(&self.to_config_overrides()))?)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a full extraction over the source tree
    Extract(commands::extract::ExtractArgs),

    /// Incrementally sync the graph with the current revision
    Sync(commands::sync::SyncArgs),

    /// Surgically re-extract a single file
    Update(commands::update::UpdateArgs),

    /// Show indexing state
    Status,
}

fn init_tracing(global: &GlobalOptions) {
    let level = if global.quiet {
        Level::ERROR
    } else if global.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    match cli.command {
        Commands::Extract(args) => commands::extract::run(&args, &cli.global.root(), &cli.global.load_config()?),
        Commands::Sync(args) => commands::sync::run(&args, &cli.global.root(), &cli.global.load_config()?),
        Commands::Update(args) => commands::update::run(&args, &cli.global.root(), &cli.global.load_config()?),
        Commands::Status => commands::status::run(&cli.global.root(), &cli.global.load_config()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn extract_accepts_global_flags() {
        let cli = Cli::parse_from(["relic", "--root", "/tmp/src", "-v", "extract"]);
        assert!(cli.global.verbose);
        assert_eq!(cli.global.root(), PathBuf::from("/tmp/src"));
        assert!(matches!(cli.command, Commands::Extract(_)));
    }

    #[test]
    fn sync_force_flag() {
        let cli = Cli::parse_from(["relic", "sync", "--force"]);
        match cli.command {
            Commands::Sync(args) => assert!(args.force),
            _ => panic!("expected sync"),
        }
    }
}
