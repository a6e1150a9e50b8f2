//! List command - show stored workflows.

use anyhow::Result;
use clap::Args;
use console::Style;
use flowport_store::{ImageStore, WorkflowStore};
use serde::Serialize;

use super::Context;

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {}

#[derive(Debug, Serialize)]
struct ListEntry {
    id: i64,
    name: String,
    uuid: Option<String>,
    images: usize,
    created_at: String,
}

/// Run the list command.
pub async fn run(_args: ListArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;

    let mut entries = Vec::new();
    for workflow in store.list().await? {
        let images = store.workflow_images(workflow.id).await?.len();
        entries.push(ListEntry {
            id: workflow.id,
            name: workflow.name,
            uuid: workflow.uuid,
            images,
            created_at: workflow.created_at.format("%Y-%m-%d %H:%M").to_string(),
        });
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    if entries.is_empty() {
        println!("{}", dim.apply_to("No workflows stored."));
        return Ok(());
    }

    let bold = Style::new().bold();
    println!(
        "{}",
        bold.apply_to(format!(
            "{:>5}  {:<32} {:>6}  {:<16}  {}",
            "ID", "NAME", "IMAGES", "CREATED", "UUID"
        ))
    );
    for entry in &entries {
        println!(
            "{:>5}  {:<32} {:>6}  {:<16}  {}",
            entry.id,
            truncate(&entry.name, 32),
            entry.images,
            entry.created_at,
            dim.apply_to(entry.uuid.as_deref().unwrap_or("-"))
        );
    }
    if ctx.verbose {
        println!();
        println!("{}", dim.apply_to(format!("database: {}", ctx.database.display())));
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
