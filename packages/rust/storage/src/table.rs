//! Local CSV file for the enriched batch.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use prospector_shared::{CONTENT_COLUMN, ProspectorError, Result, Stage, TargetRecord};

use crate::row::{Outputs, extra_columns, is_output_column, record_from_cells};

/// Reads and writes records as `url, <extras>, content, response1..3` rows.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
    url_column: String,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>, url_column: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url_column: url_column.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `records` to the file, replacing it. Parent directories are created.
    #[instrument(skip_all, fields(path = %self.path.display(), records = records.len()))]
    pub fn save(&self, records: &[TargetRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ProspectorError::io(parent, e))?;
        }

        let extras: Vec<String> = extra_columns(records)
            .into_iter()
            .filter(|c| c != &self.url_column && !is_output_column(c))
            .collect();

        let mut writer = csv::Writer::from_path(&self.path).map_err(|e| self.csv_error(e))?;

        let mut header: Vec<&str> = vec![self.url_column.as_str()];
        header.extend(extras.iter().map(String::as_str));
        header.push(CONTENT_COLUMN);
        header.extend(Stage::ALL.iter().map(|s| s.column()));
        writer.write_record(&header).map_err(|e| self.csv_error(e))?;

        for record in records {
            let mut row: Vec<&str> = vec![record.website_url.as_str()];
            for column in &extras {
                let cell = record
                    .extra
                    .iter()
                    .find(|(c, _)| c == column)
                    .map(|(_, v)| v.as_str())
                    .unwrap_or("");
                row.push(cell);
            }
            row.push(record.raw_content.as_cell());
            row.extend(Stage::ALL.iter().map(|s| record.stage_field(*s).as_cell()));
            writer.write_record(&row).map_err(|e| self.csv_error(e))?;
        }

        writer
            .flush()
            .map_err(|e| ProspectorError::io(&self.path, e))?;

        info!("saved records to CSV");
        Ok(())
    }

    /// Read a file written by [`CsvStore::save`] (or any CSV with a URL column).
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Vec<TargetRecord>> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.csv_error(e))?;

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| self.csv_error(e))?
            .iter()
            .map(str::to_string)
            .collect();

        if !header.iter().any(|c| c == &self.url_column) {
            return Err(ProspectorError::validation(format!(
                "{}: missing `{}` column",
                self.path.display(),
                self.url_column
            )));
        }

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.map_err(|e| self.csv_error(e))?;
            let cells = header
                .iter()
                .cloned()
                .zip(row.iter().map(str::to_string));
            if let Some(record) = record_from_cells(&self.url_column, index, Outputs::Read, cells) {
                records.push(record);
            }
        }

        info!(records = records.len(), "loaded records from CSV");
        Ok(records)
    }

    fn csv_error(&self, e: csv::Error) -> ProspectorError {
        ProspectorError::Storage(format!("{}: {e}", self.path.display()))
    }
}
