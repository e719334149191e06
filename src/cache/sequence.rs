//! Line format for sequence datasets.
//!
//! One example per line: comma-separated vocabulary indices, the `;;;`
//! delimiter, then the integer label.
//!
//! ```text
//! 4,17,17,2;;;0
//! 9;;;3
//! ```
//!
//! Blank lines and lines whose sequence part is empty are skipped on read.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info, warn};

use crate::error::{MailclassError, Result};

/// Separates the sequence from the label.
pub const LABEL_DELIMITER: &str = ";;;";

/// Reader and writer for the sequence line format.
#[derive(Debug, Clone, Default)]
pub struct LineFormat;

impl LineFormat {
    /// Create a line format.
    pub fn new() -> Self {
        LineFormat
    }

    /// Write one line per example.
    ///
    /// An empty sequence is written but will not be read back.
    pub fn write(&self, path: &Path, sequences: &[Vec<usize>], labels: &[usize]) -> Result<()> {
        if sequences.len() != labels.len() {
            return Err(MailclassError::shape_mismatch(format!(
                "{} sequences but {} labels",
                sequences.len(),
                labels.len()
            )));
        }

        let mut writer = BufWriter::new(File::create(path)?);
        let mut empty = 0usize;
        for (sequence, label) in sequences.iter().zip(labels) {
            if sequence.is_empty() {
                empty += 1;
            }
            let mut first = true;
            for index in sequence {
                if !first {
                    writer.write_all(b",")?;
                }
                write!(writer, "{index}")?;
                first = false;
            }
            writeln!(writer, "{LABEL_DELIMITER}{label}")?;
        }
        writer.flush()?;

        if empty > 0 {
            warn!(
                "{} of {} sequences written to {} are empty and will be skipped when read back",
                empty,
                sequences.len(),
                path.display()
            );
        }
        info!("Wrote {} sequences to {}", sequences.len(), path.display());
        Ok(())
    }

    /// Read sequences and labels, in file order.
    pub fn read(&self, path: &Path) -> Result<(Vec<Vec<usize>>, Vec<usize>)> {
        let reader = BufReader::new(File::open(path)?);
        let mut sequences = Vec::new();
        let mut labels = Vec::new();
        let mut skipped = 0usize;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line_num = line_num + 1;
            if line.trim().is_empty() {
                continue;
            }

            let (sequence, label) = line.split_once(LABEL_DELIMITER).ok_or_else(|| {
                MailclassError::cache_format(format!(
                    "{}:{line_num}: missing '{LABEL_DELIMITER}' delimiter",
                    path.display()
                ))
            })?;
            if sequence.trim().is_empty() {
                skipped += 1;
                continue;
            }

            let sequence = sequence
                .split(',')
                .map(|value| {
                    value.trim().parse::<usize>().map_err(|_| {
                        MailclassError::cache_format(format!(
                            "{}:{line_num}: invalid index '{value}'",
                            path.display()
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let label = label.trim().parse::<usize>().map_err(|_| {
                MailclassError::cache_format(format!(
                    "{}:{line_num}: invalid label '{label}'",
                    path.display()
                ))
            })?;

            sequences.push(sequence);
            labels.push(label);
        }

        if skipped > 0 {
            debug!(
                "Skipped {} empty sequences in {}",
                skipped,
                path.display()
            );
        }
        Ok((sequences, labels))
    }
}
