//! Import command - load an exchange document into the store.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use console::{Style, style};
use flowport_exchange::{ImportService, ImportSummary, ProgressEvent};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncReadExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use super::Context;

/// Arguments for the import command.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Exchange document to import ("-" reads stdin)
    pub file: PathBuf,

    /// Parse incrementally or load the whole document first
    #[arg(long, value_enum, default_value_t = ImportMode::Stream)]
    pub mode: ImportMode,

    /// Reject older schema versions and workflows without a uuid
    #[arg(long)]
    pub study_mode: bool,

    /// Do not render a progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportMode {
    Stream,
    Batch,
}

/// Run the import command.
pub async fn run(args: ImportArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.import_config();
    if args.study_mode {
        config.study_mode = true;
    }

    let store = ctx.open_store()?;
    let service = ImportService::new(&config, store.clone(), store)?;

    let bar = if ctx.json_output || args.quiet {
        ProgressBar::hidden()
    } else {
        progress_bar()
    };
    let renderer = tokio::spawn(render_progress(service.subscribe(), bar));

    debug!(file = %args.file.display(), mode = ?args.mode, "Starting import");
    let outcome = import(&service, &args).await;

    // Dropping the service closes the progress bus and ends the renderer.
    drop(service);
    if let Err(e) = renderer.await {
        debug!(error = %e, "Progress renderer stopped");
    }

    let summary = outcome?;
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, ctx.verbose);
    }
    Ok(())
}

async fn import(service: &ImportService, args: &ImportArgs) -> Result<ImportSummary> {
    let from_stdin = args.file.as_os_str() == "-";
    let summary = match (args.mode, from_stdin) {
        (ImportMode::Stream, true) => service.import_json_stream(tokio::io::stdin()).await?,
        (ImportMode::Stream, false) => {
            let file = tokio::fs::File::open(&args.file)
                .await
                .with_context(|| format!("Failed to open {}", args.file.display()))?;
            service.import_json_stream(file).await?
        }
        (ImportMode::Batch, true) => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Failed to read stdin")?;
            service.import_json_string(text).await?
        }
        (ImportMode::Batch, false) => {
            let text = tokio::fs::read_to_string(&args.file)
                .await
                .with_context(|| format!("Failed to read {}", args.file.display()))?;
            service.import_json_string(text).await?
        }
    };
    Ok(summary)
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{prefix:8} {spinner:.dim} [{bar:25}] {pos}/{len}  {msg}",
    )
    .map(|s| s.progress_chars("=>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_prefix("import");
    bar
}

/// Mirror progress events onto the bar until the bus closes.
async fn render_progress(mut rx: broadcast::Receiver<ProgressEvent>, bar: ProgressBar) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let progress = event.progress;
                bar.set_length(progress.events_total);
                bar.set_position(progress.events_count);
                if progress.finished {
                    if progress.is_failed() {
                        bar.abandon_with_message(progress.text);
                    } else {
                        bar.finish_with_message("done");
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Progress renderer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_summary(summary: &ImportSummary, verbose: bool) {
    let green = Style::new().green();
    let dim = Style::new().dim();

    println!(
        "{} Imported {} workflow(s) and {} image(s) in {} ms",
        green.apply_to("✓"),
        summary.workflow_ids.len(),
        summary.images_stored,
        summary.duration_ms
    );
    println!(
        "  {} {}",
        dim.apply_to("schema version:"),
        summary.version
    );
    if !summary.workflow_ids.is_empty() {
        let ids: Vec<String> = summary.workflow_ids.iter().map(|id| id.to_string()).collect();
        println!("  {} {}", dim.apply_to("workflow ids:"), ids.join(", "));
    }
    if verbose {
        println!("  {} {}", dim.apply_to("job:"), style(summary.job_id).cyan());
    }
}
