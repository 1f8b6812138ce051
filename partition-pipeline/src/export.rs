use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use common::error::AppError;
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Serializer};

use crate::source::load_rows_async;

fn write_text_export(source: &Path, target: &Path) -> Result<usize, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(source)?;
    let mut writer = BufWriter::new(File::create(target)?);

    let mut lines = 0_usize;
    for result in reader.records() {
        let record = result?;
        let line = record.iter().collect::<Vec<_>>().join(", ");
        writeln!(writer, "{line}")?;
        lines = lines.saturating_add(1);
    }
    writer.flush()?;

    Ok(lines)
}

/// Writes the table as plain text: the header line, then one line per row,
/// fields joined with `", "`. Returns the number of lines written.
pub async fn export_text(source: &Path, target: &Path) -> Result<usize, AppError> {
    let source = source.to_path_buf();
    let target = target.to_path_buf();
    tokio::task::spawn_blocking(move || write_text_export(&source, &target)).await?
}

/// Writes the whole table as one JSON array of row records.
pub async fn export_json(source: &Path, target: &Path) -> Result<usize, AppError> {
    let rows = load_rows_async(source).await?;

    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    rows.serialize(&mut serializer)?;
    tokio::fs::write(target, buffer).await?;

    Ok(rows.len())
}
