use std::path::Path;

use common::{error::AppError, utils::config::SourceTable};
use serde_json::{Map, Value};

/// One source row, keyed by column header in source column order.
pub type Record = Map<String, Value>;

/// Fails with `SourceNotFound` for the first declared table that is not a
/// readable file. Nothing is written by this check.
pub async fn ensure_sources_exist(sources: &[SourceTable]) -> Result<(), AppError> {
    for source in sources {
        let is_file = match tokio::fs::metadata(&source.path).await {
            Ok(metadata) => metadata.is_file(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
            Err(err) => return Err(err.into()),
        };

        if !is_file {
            return Err(AppError::SourceNotFound(format!(
                "{} ({})",
                source.category,
                source.path.display()
            )));
        }
    }

    Ok(())
}

/// Reads a CSV table with a header row. Every value is kept as a string.
pub fn load_rows(path: &Path) -> Result<Vec<Record>, AppError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let row: Record = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), Value::String(value.to_string())))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

pub async fn load_rows_async(path: &Path) -> Result<Vec<Record>, AppError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || load_rows(&path)).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_rows_keeps_column_order() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("table.csv");
        std::fs::write(
            &path,
            "Province/State,Country/Region,1/22/20\n,Italy,0\nHubei,China,444\n",
        )
        .expect("write csv");

        let rows = load_rows(&path).expect("load");

        assert_eq!(rows.len(), 2);
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Province/State", "Country/Region", "1/22/20"]);
        assert_eq!(rows[1]["Province/State"], Value::String("Hubei".into()));
        assert_eq!(rows[1]["1/22/20"], Value::String("444".into()));
    }

    #[test]
    fn test_load_rows_handles_quoted_fields() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("table.csv");
        std::fs::write(&path, "Country/Region,Total\n\"Korea, South\",12\n").expect("write csv");

        let rows = load_rows(&path).expect("load");

        assert_eq!(
            rows[0]["Country/Region"],
            Value::String("Korea, South".into())
        );
    }

    #[tokio::test]
    async fn test_missing_source_is_reported() {
        let dir = tempdir().expect("tempdir");
        let present = dir.path().join("present.csv");
        std::fs::write(&present, "Country/Region\nItaly\n").expect("write csv");

        let sources = vec![
            SourceTable {
                category: "Confirmed".into(),
                path: present,
            },
            SourceTable {
                category: "Deaths".into(),
                path: dir.path().join("absent.csv"),
            },
        ];

        let result = ensure_sources_exist(&sources).await;
        assert!(matches!(result, Err(AppError::SourceNotFound(msg)) if msg.contains("Deaths")));
    }

    #[tokio::test]
    async fn test_directory_is_not_a_source() {
        let dir = tempdir().expect("tempdir");
        let sources = vec![SourceTable {
            category: "Confirmed".into(),
            path: dir.path().to_path_buf(),
        }];

        let result = ensure_sources_exist(&sources).await;
        assert!(matches!(result, Err(AppError::SourceNotFound(_))));
    }
}
