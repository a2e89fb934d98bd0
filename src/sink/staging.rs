//! Local staging artifact

use std::fs;
use std::path::{Path, PathBuf};

use super::error::TransferError;
use crate::table::RecordSet;

/// Write a table as delimited text with a header row
///
/// The file is written next to its final location and renamed into place, so
/// readers never observe a half-written artifact. Nulls are written as empty
/// fields. Returns the number of data rows written.
pub fn write_staging_csv(table: &RecordSet, path: &Path) -> Result<u64, TransferError> {
    let staging_error = |reason: String| TransferError::StagingWrite {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| staging_error(e.to_string()))?;
    }

    let temp = temp_path(path);
    let result = write_rows(table, &temp).and_then(|rows| {
        fs::rename(&temp, path).map_err(|e| e.to_string())?;
        Ok(rows)
    });

    match result {
        Ok(rows) => {
            tracing::info!(
                path = %path.display(),
                rows,
                columns = table.column_count(),
                "Wrote staging file"
            );
            Ok(rows)
        }
        Err(reason) => {
            let _ = fs::remove_file(&temp);
            Err(staging_error(reason))
        }
    }
}

fn write_rows(table: &RecordSet, temp: &Path) -> Result<u64, String> {
    let mut writer = ::csv::Writer::from_path(temp).map_err(|e| e.to_string())?;

    if table.column_count() > 0 {
        writer
            .write_record(table.columns())
            .map_err(|e| e.to_string())?;
    }

    let mut rows = 0u64;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_field()))
            .map_err(|e| e.to_string())?;
        rows += 1;
    }

    writer.flush().map_err(|e| e.to_string())?;
    Ok(rows)
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "staging".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use tempfile::TempDir;

    fn sample() -> RecordSet {
        RecordSet::from_records(vec![
            vec![
                ("name", Value::from("Doe, Jane")),
                ("height_meters", Value::Float(1.778)),
            ],
            vec![("name", Value::from("bo")), ("height_meters", Value::Null)],
        ])
    }

    #[test]
    fn test_write_staging_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("transformed_data.csv");

        let rows = write_staging_csv(&sample(), &path).unwrap();
        assert_eq!(rows, 2);

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "name,height_meters\n\"Doe, Jane\",1.778\nbo,\n"
        );
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_write_staging_csv_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "old,content\n1,2\n3,4\n5,6\n").unwrap();

        write_staging_csv(&sample(), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("name,height_meters\n"));
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_write_staging_csv_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        write_staging_csv(&sample(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_staging_csv_unwritable_location() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let path = blocker.join("out.csv");

        let err = write_staging_csv(&sample(), &path).unwrap_err();
        assert!(matches!(err, TransferError::StagingWrite { .. }));
    }
}
