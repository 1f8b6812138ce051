use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use common::utils::config::get_config;
use partition_pipeline::{export_json, export_target, export_text, run_partition};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Partition the configured source tables into one JSON document per entity
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Directory holding the source CSV tables
    #[arg(long)]
    source_dir: Option<String>,

    /// Root directory for the per-category output
    #[arg(long)]
    output_dir: Option<String>,

    /// Column that names the entity of each row
    #[arg(long)]
    entity_field: Option<String>,

    /// Comma separated category labels
    #[arg(long, value_delimiter = ',')]
    categories: Vec<String>,

    /// Also write each table as plain text into this directory
    #[arg(long)]
    export_text: Option<PathBuf>,

    /// Also write each table as a single JSON array into this directory
    #[arg(long)]
    export_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let mut config = get_config().context("failed to load configuration")?;
    if let Some(source_dir) = cli.source_dir {
        config.source_dir = source_dir;
    }
    if let Some(output_dir) = cli.output_dir {
        config.partition_output_dir = output_dir;
    }
    if let Some(entity_field) = cli.entity_field {
        config.entity_field = entity_field;
    }
    if !cli.categories.is_empty() {
        config.partition_categories = cli.categories;
    }

    let summaries = run_partition(&config)
        .await
        .context("partitioning source tables")?;
    for summary in &summaries {
        println!(
            "{}: {} documents from {} rows ({} skipped) in {}",
            summary.category,
            summary.documents,
            summary.rows,
            summary.skipped_rows,
            summary.output_dir.display()
        );
    }

    for (dir, extension) in [(&cli.export_text, "txt"), (&cli.export_json, "json")] {
        let Some(dir) = dir else { continue };
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating export directory {}", dir.display()))?;

        for source in config.source_tables() {
            let target = export_target(&source, dir, extension);
            if extension == "txt" {
                export_text(&source.path, &target).await?;
            } else {
                export_json(&source.path, &target).await?;
            }
            info!(category = %source.category, target = %target.display(), "exported source table");
        }
    }

    Ok(())
}
