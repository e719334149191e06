//! Tabular cache format for matrix datasets.
//!
//! ```csv
//! ,meeting,lunch,label
//! 0,1,0,0
//! 1,0,2,1
//! ```
//!
//! The first column is a row index with an empty header (`Unnamed: 0` is
//! accepted too) and is dropped on read. The label column is the last column
//! named `label`; a vocabulary word that happens to be `label` therefore does
//! not shadow it.

use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, info};

use crate::dataset::FeatureMatrix;
use crate::error::{MailclassError, Result};

/// Header of the reserved label column.
pub const LABEL_COLUMN: &str = "label";

/// Header names recognised as the row index column.
const INDEX_COLUMNS: [&str; 2] = ["", "Unnamed: 0"];

/// Contents of a tabular cache file.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Feature values, one row per example.
    pub matrix: FeatureMatrix,
    /// Integer label per example.
    pub labels: Vec<usize>,
    /// Feature column headers.
    pub feature_names: Vec<String>,
}

/// Reader and writer for the tabular format.
#[derive(Debug, Clone)]
pub struct TabularFormat {
    /// CSV delimiter character (default: ',')
    delimiter: u8,
}

impl Default for TabularFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl TabularFormat {
    /// Create a tabular format with comma delimiter.
    pub fn new() -> Self {
        TabularFormat { delimiter: b',' }
    }

    /// Set a custom delimiter character. The CSV reader works on bytes, so
    /// only ASCII delimiters are accepted.
    pub fn with_delimiter(mut self, delimiter: char) -> Result<Self> {
        if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
            return Err(MailclassError::invalid_argument(format!(
                "delimiter {delimiter:?} is not a usable single-byte CSV delimiter"
            )));
        }
        self.delimiter = delimiter as u8;
        Ok(self)
    }

    /// Write features, labels and feature names to `path`.
    pub fn write(
        &self,
        path: &Path,
        matrix: &FeatureMatrix,
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<()> {
        if matrix.n_rows() != labels.len() {
            return Err(MailclassError::shape_mismatch(format!(
                "{} rows but {} labels",
                matrix.n_rows(),
                labels.len()
            )));
        }
        if matrix.n_cols() != feature_names.len() {
            return Err(MailclassError::shape_mismatch(format!(
                "{} columns but {} feature names",
                matrix.n_cols(),
                feature_names.len()
            )));
        }

        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)?;

        let mut header = Vec::with_capacity(feature_names.len() + 2);
        header.push("");
        header.extend(feature_names.iter().map(String::as_str));
        header.push(LABEL_COLUMN);
        writer.write_record(&header)?;

        let mut record = Vec::with_capacity(feature_names.len() + 2);
        for (i, (row, label)) in matrix.rows().zip(labels).enumerate() {
            record.clear();
            record.push(i.to_string());
            record.extend(row.iter().map(f64::to_string));
            record.push(label.to_string());
            writer.write_record(&record)?;
        }
        writer.flush()?;

        info!(
            "Wrote CSV with {} rows and {} feature columns to {}",
            labels.len(),
            feature_names.len(),
            path.display()
        );
        Ok(())
    }

    /// Read a table written by [`TabularFormat::write`] or by an external
    /// exporter using the same layout.
    pub fn read(&self, path: &Path) -> Result<Table> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let label_column = (0..headers.len())
            .rev()
            .find(|&i| &headers[i] == LABEL_COLUMN)
            .ok_or_else(|| {
                MailclassError::cache_format(format!(
                    "{}: no '{LABEL_COLUMN}' column",
                    path.display()
                ))
            })?;
        let index_column = match headers.get(0) {
            Some(first) if label_column != 0 && INDEX_COLUMNS.contains(&first) => Some(0),
            _ => None,
        };

        let feature_columns: Vec<usize> = (0..headers.len())
            .filter(|&c| c != label_column && Some(c) != index_column)
            .collect();
        let feature_names: Vec<String> = feature_columns
            .iter()
            .map(|&c| headers[c].to_string())
            .collect();
        debug!("Read CSV with columns {:?}", headers);

        let mut matrix = FeatureMatrix::with_columns(feature_columns.len());
        let mut labels = Vec::new();
        let mut row = Vec::with_capacity(feature_columns.len());
        for (row_num, record) in reader.records().enumerate() {
            let line = row_num + 2;
            let record = record.map_err(|e| {
                MailclassError::cache_format(format!("{}:{line}: {e}", path.display()))
            })?;

            row.clear();
            for &c in &feature_columns {
                let value = record[c].trim().parse::<f64>().map_err(|_| {
                    MailclassError::cache_format(format!(
                        "{}:{line}: column '{}' holds non-numeric value '{}'",
                        path.display(),
                        &headers[c],
                        &record[c]
                    ))
                })?;
                row.push(value);
            }
            matrix.push_row(&row)?;

            let label = record[label_column].trim().parse::<usize>().map_err(|_| {
                MailclassError::cache_format(format!(
                    "{}:{line}: invalid label '{}'",
                    path.display(),
                    &record[label_column]
                ))
            })?;
            labels.push(label);
        }

        Ok(Table {
            matrix,
            labels,
            feature_names,
        })
    }
}
