//! Export command - write stored workflows as an exchange document.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use console::Style;
use flowport_exchange::ExportService;
use flowport_types::WorkflowId;

use super::Context;

/// Arguments for the export command.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Workflow ids to export (all workflows when omitted)
    pub ids: Vec<WorkflowId>,

    /// Write the document to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the export command.
pub async fn run(args: ExportArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let service =
        ExportService::new(store.clone(), store).with_version(ctx.import_config().schema_version);

    let document = if args.ids.is_empty() {
        service.export_all().await?
    } else {
        service.export(&args.ids).await?
    };
    let json = serde_json::to_string_pretty(&document)?;

    match args.output {
        Some(path) => {
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if ctx.json_output {
                println!(
                    "{}",
                    serde_json::json!({
                        "output": path,
                        "workflows": document.workflows.len(),
                        "images": document.images.len(),
                    })
                );
            } else {
                let green = Style::new().green();
                println!(
                    "{} Exported {} workflow(s) and {} image(s) to {}",
                    green.apply_to("✓"),
                    document.workflows.len(),
                    document.images.len(),
                    path.display()
                );
            }
        }
        None => println!("{json}"),
    }
    Ok(())
}
