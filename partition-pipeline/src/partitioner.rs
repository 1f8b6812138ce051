use std::{
    collections::{hash_map::Entry, HashMap},
    path::{Path, PathBuf},
};

use common::{error::AppError, utils::config::SourceTable};
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Serializer, Value};
use tracing::{info, warn};

use crate::source::{ensure_sources_exist, load_rows_async, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSummary {
    pub category: String,
    pub output_dir: PathBuf,
    pub documents: usize,
    pub rows: usize,
    pub skipped_rows: usize,
}

/// Replaces every character that is not alphanumeric with `_`.
pub fn normalize_entity_name(entity: &str) -> String {
    entity
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn document_file_name(entity: &str, category: &str) -> String {
    format!("{}_{category}.json", normalize_entity_name(entity))
}

/// Rows of one entity, in source order.
struct EntityGroup<'a> {
    entity: String,
    file_name: String,
    rows: Vec<&'a Record>,
}

/// Groups rows by trimmed entity name, keeping first-appearance order.
///
/// Returns the groups and the number of rows that had no usable entity name.
fn group_rows<'a>(
    rows: &'a [Record],
    entity_field: &str,
    category: &str,
) -> Result<(Vec<EntityGroup<'a>>, usize), AppError> {
    let mut groups: Vec<EntityGroup<'a>> = Vec::new();
    let mut by_entity: HashMap<String, usize> = HashMap::new();
    let mut by_file: HashMap<String, String> = HashMap::new();
    let mut skipped = 0_usize;

    for row in rows {
        let Some(entity) = row
            .get(entity_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
        else {
            skipped = skipped.saturating_add(1);
            continue;
        };

        if let Some(&index) = by_entity.get(entity) {
            if let Some(group) = groups.get_mut(index) {
                group.rows.push(row);
            }
            continue;
        }

        let file_name = document_file_name(entity, category);
        match by_file.entry(file_name.clone()) {
            Entry::Occupied(existing) => {
                return Err(AppError::Validation(format!(
                    "Entities '{}' and '{entity}' both map to {file_name}",
                    existing.get()
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(entity.to_string());
            }
        }

        by_entity.insert(entity.to_string(), groups.len());
        groups.push(EntityGroup {
            entity: entity.to_string(),
            file_name,
            rows: vec![row],
        });
    }

    Ok((groups, skipped))
}

fn render_document(rows: &[&Record]) -> Result<Vec<u8>, AppError> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    rows.serialize(&mut serializer)?;
    Ok(buffer)
}

async fn recreate_dir(dir: &Path) -> Result<(), AppError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

struct PlannedDocument {
    entity: String,
    file_name: String,
    rows: usize,
    bytes: Vec<u8>,
}

/// Fully rendered output of one category, ready to be written.
pub struct PartitionPlan {
    category: String,
    documents: Vec<PlannedDocument>,
    rows: usize,
    skipped_rows: usize,
}

/// Groups and renders `rows` without touching the filesystem.
///
/// A non-empty table in which no row carries a usable `entity_field` value is
/// rejected, as are two entities that map to the same file name.
pub fn plan_partition(
    rows: &[Record],
    entity_field: &str,
    category: &str,
) -> Result<PartitionPlan, AppError> {
    let (groups, skipped_rows) = group_rows(rows, entity_field, category)?;

    if !rows.is_empty() && groups.is_empty() {
        let reason = if rows.iter().any(|row| row.contains_key(entity_field)) {
            "has no row with a non-empty value in"
        } else {
            "has no column"
        };
        return Err(AppError::Validation(format!(
            "{category} table {reason} '{entity_field}'"
        )));
    }
    if skipped_rows > 0 {
        warn!(
            category,
            entity_field,
            skipped_rows,
            "rows without an entity name were skipped"
        );
    }

    let documents = groups
        .into_iter()
        .map(|group| {
            Ok(PlannedDocument {
                bytes: render_document(&group.rows)?,
                rows: group.rows.len(),
                entity: group.entity,
                file_name: group.file_name,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(PartitionPlan {
        category: category.to_string(),
        documents,
        rows: rows.len().saturating_sub(skipped_rows),
        skipped_rows,
    })
}

/// Replaces `output_dir` with the documents of `plan`.
pub async fn write_plan(
    plan: PartitionPlan,
    output_dir: &Path,
) -> Result<PartitionSummary, AppError> {
    recreate_dir(output_dir).await?;

    let document_count = plan.documents.len();
    for document in plan.documents {
        let path = output_dir.join(&document.file_name);
        tokio::fs::write(&path, document.bytes).await?;
        tracing::debug!(
            category = %plan.category,
            entity = %document.entity,
            rows = document.rows,
            path = %path.display(),
            "wrote entity document"
        );
    }

    Ok(PartitionSummary {
        category: plan.category,
        output_dir: output_dir.to_path_buf(),
        documents: document_count,
        rows: plan.rows,
        skipped_rows: plan.skipped_rows,
    })
}

/// Writes one JSON array document per entity into `output_dir`.
///
/// The directory is removed and recreated first, so the result only depends
/// on `rows`. Grouping and file-name checks run before anything on disk is
/// touched.
pub async fn partition(
    rows: &[Record],
    entity_field: &str,
    category: &str,
    output_dir: &Path,
) -> Result<PartitionSummary, AppError> {
    let plan = plan_partition(rows, entity_field, category)?;
    write_plan(plan, output_dir).await
}

/// Partitions every declared source into `output_root/<category>/`.
///
/// Every table is checked, parsed and planned before the first output
/// directory is rebuilt, so a missing or invalid table leaves the output
/// tree untouched.
pub async fn partition_sources(
    sources: &[SourceTable],
    entity_field: &str,
    output_root: &Path,
) -> Result<Vec<PartitionSummary>, AppError> {
    ensure_sources_exist(sources).await?;

    let mut plans = Vec::with_capacity(sources.len());
    for source in sources {
        let rows = load_rows_async(&source.path).await?;
        plans.push(plan_partition(&rows, entity_field, &source.category)?);
    }

    let mut summaries = Vec::with_capacity(plans.len());
    for plan in plans {
        let output_dir = output_root.join(&plan.category);
        let summary = write_plan(plan, &output_dir).await?;
        info!(
            category = %summary.category,
            documents = summary.documents,
            rows = summary.rows,
            skipped_rows = summary.skipped_rows,
            output_dir = %summary.output_dir.display(),
            "partitioned source table"
        );
        summaries.push(summary);
    }

    Ok(summaries)
}
