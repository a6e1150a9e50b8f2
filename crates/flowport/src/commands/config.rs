//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use console::Style;
use flowport_config::{FlowportConfig, ImportConfig, LoggingConfig, StorageConfig};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Show configuration file path
    Path,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./flowport.toml) instead of user config
        #[arg(long)]
        local: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { local } => cmd_init(ctx, local),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    let import = loaded.config.import();

    if ctx.json_output {
        let resolved = serde_json::json!({
            "sources": loaded.loaded_from(),
            "import": import,
            "database": ctx.database,
            "logging": loaded.config.logging.clone().unwrap_or_default(),
            "warnings": loaded.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    let bold = Style::new().bold();
    let dim = Style::new().dim();

    println!("{}\n", bold.apply_to("# flowport configuration"));

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    println!("Import:");
    println!("  {:<26} {}", "schema_version", import.schema_version);
    println!("  {:<26} {}", "study_mode", import.study_mode);
    println!("  {:<26} {}", "image_media_type", import.image_media_type);
    println!("  {:<26} {}", "chunk_size", import.chunk_size);
    println!("  {:<26} {}", "read_ahead_chunks", import.read_ahead_chunks);
    println!(
        "  {:<26} {}",
        "progress_channel_capacity", import.progress_channel_capacity
    );
    println!();

    println!("Storage:");
    println!("  {:<26} {}", "database", ctx.database.display());
    println!();

    if let Some(ref logging) = loaded.config.logging {
        println!("Logging:");
        println!(
            "  {:<26} {}",
            "level",
            logging.level.as_deref().unwrap_or("(default)")
        );
        println!("  {:<26} {}", "json_file", logging.json_file);
        println!();
    }

    if !loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &loaded.warnings {
            println!("  {} {}", dim.apply_to("⚠"), w);
        }
    }

    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let green = Style::new().green();
    let dim = Style::new().dim();

    println!("Search order, lowest precedence first:\n");
    for source in &ctx.loaded.sources {
        if source.loaded {
            println!("  {} {}", green.apply_to("✓ loaded   "), source.path.display());
        } else {
            println!("  {} {}", dim.apply_to("· not found"), source.path.display());
        }
    }
    println!();

    match ctx.loaded.loaded_from().len() {
        0 => println!("Using built-in defaults. 'flowport config init' writes a config file."),
        n => println!("{n} config file(s) loaded."),
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    match user_config_path(ctx) {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("Could not determine config directory"),
    }
    Ok(())
}

fn cmd_init(ctx: &Context, local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("flowport.toml")
    } else {
        user_config_path(ctx).ok_or_else(|| anyhow!("Could not determine config directory"))?
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    let defaults = FlowportConfig {
        import: Some(ImportConfig::default()),
        storage: Some(StorageConfig {
            database: Some(ctx.loaded.config.database_path()),
        }),
        logging: Some(LoggingConfig::default()),
    };
    flowport_config::save_config(&defaults, &path)?;

    println!("Created config file: {}", path.display());
    Ok(())
}

fn user_config_path(ctx: &Context) -> Option<PathBuf> {
    match &ctx.config_dir {
        Some(dir) => Some(dir.join("config.toml")),
        None => flowport_config::xdg_config_path(),
    }
}
