// src/export/mod.rs

//! Tabular export of harvested records.
//!
//! Writes the in-memory record sequence to a timestamped CSV or XLSX
//! file. Validation happens before any file is created; no partial
//! file is left behind on a rejected request.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use rust_xlsxwriter::Workbook;
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::Record;

/// UTF-8 byte order mark, so spreadsheet tools detect the encoding.
const BOM: &[u8] = b"\xef\xbb\xbf";

/// Export records to `dir` in the requested format.
///
/// Accepted format tokens: `csv`, `xlsx` (with `excel` as an alias).
/// An empty record set or an unknown token is a rejected request.
pub fn export(records: &[Record], format: &str, dir: &Path, prefix: &str) -> Result<PathBuf> {
    if records.is_empty() {
        return Err(AppError::NoData);
    }

    let extension = match format.trim().to_lowercase().as_str() {
        "csv" => "csv",
        "xlsx" | "excel" => "xlsx",
        other => return Err(AppError::UnsupportedFormat(other.to_string())),
    };

    fs::create_dir_all(dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{prefix}_{timestamp}.{extension}"));

    match extension {
        "csv" => write_csv(records, &path)?,
        _ => write_xlsx(records, &path)?,
    }

    info!("exported {} records to {}", records.len(), path.display());
    Ok(path)
}

/// MIME type for a produced export file.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "text/csv; charset=utf-8",
    }
}

fn write_csv(records: &[Record], path: &Path) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(records[0].headers())?;
    for record in records {
        writer.write_record(record.row())?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(records: &[Record], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in records[0].headers().iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }
    for (row, record) in records.iter().enumerate() {
        for (col, cell) in record.row().iter().enumerate() {
            worksheet.write_string(row as u32 + 1, col as u16, cell)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Startup;
    use tempfile::TempDir;

    fn records() -> Vec<Record> {
        vec![Record::Startup(Startup {
            name: "Acme".to_string(),
            description: "Rocket-powered widgets".to_string(),
            detail_url: "https://directory.example/startup/acme".to_string(),
            votes: 42,
            ..Startup::default()
        })]
    }

    #[test]
    fn test_export_rejects_empty_records() {
        let tmp = TempDir::new().unwrap();

        let result = export(&[], "csv", tmp.path(), "startups");

        assert!(matches!(result, Err(AppError::NoData)));
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_rejects_unknown_format() {
        let tmp = TempDir::new().unwrap();

        let result = export(&records(), "pdf", tmp.path(), "startups");

        assert!(matches!(result, Err(AppError::UnsupportedFormat(f)) if f == "pdf"));
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_csv_writes_bom_headers_and_rows() {
        let tmp = TempDir::new().unwrap();

        let path = export(&records(), "csv", tmp.path(), "startups").unwrap();

        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("startups_"));
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(BOM));

        let content = String::from_utf8(bytes[BOM.len()..].to_vec()).unwrap();
        assert!(content.starts_with("name,description,"));
        assert!(content.contains("Acme"));
        assert!(content.contains("42"));
        // The internal dedup key never reaches the export
        assert!(!content.contains("detail_url"));
        assert!(!content.contains("/startup/acme"));
    }

    #[test]
    fn test_export_xlsx_accepts_excel_alias() {
        let tmp = TempDir::new().unwrap();

        let path = export(&records(), "excel", tmp.path(), "startups").unwrap();

        assert_eq!(path.extension().unwrap(), "xlsx");
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(
            content_type(Path::new("a.xlsx")),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(content_type(Path::new("a.csv")), "text/csv; charset=utf-8");
    }
}
