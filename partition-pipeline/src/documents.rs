use std::path::{Path, PathBuf};

use common::error::AppError;

/// Lists the `.json` documents under `root/<category>/` for each category,
/// sorted by path. Categories without an output directory are skipped.
pub async fn collect_documents(
    root: &Path,
    categories: &[String],
) -> Result<Vec<PathBuf>, AppError> {
    let mut documents = Vec::new();

    for category in categories {
        let dir = root.join(category);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(category, dir = %dir.display(), "no partitioned output for category");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            if is_json && entry.file_type().await?.is_file() {
                documents.push(path);
            }
        }
    }

    documents.sort();
    Ok(documents)
}
