//! flowport - import and export workflow exchange documents
//!
//! Main entry point for the flowport CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use flowport_config::FlowportConfig;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;

mod commands;

use commands::{config, export, import, list};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// flowport - import and export workflow exchange documents
#[derive(Parser)]
#[command(name = "flowport")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding config.toml (default: platform config directory)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// SQLite database to use (overrides [storage] database)
    #[arg(long, global = true, env = "FLOWPORT_DATABASE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import an exchange document
    Import(import::ImportArgs),

    /// Export workflows as an exchange document
    Export(export::ExportArgs),

    /// List stored workflows
    List(list::ListArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = flowport_config::load_config_with_options(None, cli.config_dir.as_deref())?;
    let _guard = init_tracing(&cli, &loaded.config);
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }

    let database = cli
        .database
        .clone()
        .unwrap_or_else(|| loaded.config.database_path());

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir: cli.config_dir.clone(),
        database,
        loaded,
    };

    match cli.command {
        Commands::Import(args) => import::run(args, &ctx).await,
        Commands::Export(args) => export::run(args, &ctx).await,
        Commands::List(args) => list::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Console layer on stderr, plus a daily-rolling JSON file when enabled in
/// `[logging]`. The returned guard flushes the file writer on drop.
fn init_tracing(cli: &Cli, config: &FlowportConfig) -> Option<WorkerGuard> {
    use tracing_subscriber::prelude::*;

    let logging = config.logging.clone().unwrap_or_default();
    let filter = if cli.verbose {
        "flowport=debug,flowport_exchange=debug,flowport_store=debug,flowport_config=debug,info"
            .to_string()
    } else {
        logging
            .level
            .unwrap_or_else(|| "flowport=info,flowport_exchange=info,warn".to_string())
    };

    let (file_layer, guard) = if logging.json_file {
        let log_dir = cli
            .config_dir
            .clone()
            .or_else(flowport_config::xdg_config_dir)
            .map(|d| d.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));
        let file_appender = tracing_appender::rolling::daily(&log_dir, "flowport.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(tracing_subscriber::EnvFilter::new(
                "flowport=trace,flowport_exchange=trace,flowport_store=trace,flowport_config=trace,info",
            ));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer)
        .init();

    guard
}
