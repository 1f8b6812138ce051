#![allow(clippy::missing_docs_in_private_items)]

pub mod documents;
pub mod export;
pub mod partitioner;
pub mod source;

use std::path::{Path, PathBuf};

use common::{
    error::AppError,
    utils::config::{AppConfig, CorpusLayout, SourceTable},
};
pub use documents::collect_documents;
pub use export::{export_json, export_text};
pub use partitioner::{normalize_entity_name, partition, partition_sources, PartitionSummary};
pub use source::{load_rows, Record};
use tracing::info;

/// Runs the partition step for every source table declared in `config`.
pub async fn run_partition(config: &AppConfig) -> Result<Vec<PartitionSummary>, AppError> {
    partition_sources(
        &config.source_tables(),
        &config.entity_field,
        Path::new(&config.partition_output_dir),
    )
    .await
}

/// Path of the flat export of `source` inside `export_dir`.
pub fn export_target(source: &SourceTable, export_dir: &Path, extension: &str) -> PathBuf {
    let stem = source
        .path
        .file_stem()
        .map_or_else(|| source.category.clone(), |stem| stem.to_string_lossy().into_owned());
    export_dir.join(format!("{stem}.{extension}"))
}

/// Produces the files that make up the answering corpus for the configured
/// layout and returns their paths.
pub async fn build_corpus_files(config: &AppConfig) -> Result<Vec<PathBuf>, AppError> {
    let sources = config.source_tables();

    let files = match config.corpus_layout {
        CorpusLayout::Partitioned => {
            if config.partition_on_startup {
                run_partition(config).await?;
            }
            collect_documents(
                Path::new(&config.partition_output_dir),
                &config.partition_categories,
            )
            .await?
        }
        CorpusLayout::FlatJson | CorpusLayout::FlatText => {
            source::ensure_sources_exist(&sources).await?;
            let export_dir = Path::new(&config.data_dir).join("exports");
            tokio::fs::create_dir_all(&export_dir).await?;

            let mut files = Vec::with_capacity(sources.len());
            for source in &sources {
                let target = if config.corpus_layout == CorpusLayout::FlatJson {
                    let target = export_target(source, &export_dir, "json");
                    export_json(&source.path, &target).await?;
                    target
                } else {
                    let target = export_target(source, &export_dir, "txt");
                    export_text(&source.path, &target).await?;
                    target
                };
                info!(category = %source.category, target = %target.display(), "exported source table");
                files.push(target);
            }
            files
        }
    };

    if files.is_empty() {
        return Err(AppError::Startup(
            "no corpus documents were produced".into(),
        ));
    }

    info!(
        layout = ?config.corpus_layout,
        documents = files.len(),
        "corpus files ready"
    );
    Ok(files)
}
