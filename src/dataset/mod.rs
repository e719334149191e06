//! Feature and label dataset construction.
//!
//! # Architecture
//!
//! - [`label_filter`]: drops rare labels and fixes the label → index order
//! - [`vocabulary`]: ranks words by corpus frequency
//! - [`encoder`]: turns token lists into matrix rows or index sequences
//! - [`builder`]: runs the three steps over a list of emails
//!
//! The output of every path is an [`EncodedDataset`], whose features are
//! the tagged [`Features`] variant.

pub mod builder;
pub mod encoder;
pub mod label_filter;
pub mod vocabulary;

pub use builder::{DatasetBuilder, FeatureKind};
pub use encoder::{FeatureEncoder, MatrixMode};
pub use label_filter::{LabelFilter, LabelFilterOutcome, LabelSet};
pub use vocabulary::{Vocabulary, VocabularyBuilder};

use serde::{Deserialize, Serialize};

use crate::error::{MailclassError, Result};

/// Dense row-major matrix of `f64` values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureMatrix {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl FeatureMatrix {
    /// Create a zero-filled matrix.
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        FeatureMatrix {
            data: vec![0.0; n_rows * n_cols],
            n_rows,
            n_cols,
        }
    }

    /// Create an empty matrix with a fixed column count.
    pub fn with_columns(n_cols: usize) -> Self {
        FeatureMatrix {
            data: Vec::new(),
            n_rows: 0,
            n_cols,
        }
    }

    /// Build a matrix from rows, which must all have `n_cols` values.
    pub fn from_rows(rows: Vec<Vec<f64>>, n_cols: usize) -> Result<Self> {
        let mut matrix = FeatureMatrix::with_columns(n_cols);
        for row in rows {
            matrix.push_row(&row)?;
        }
        Ok(matrix)
    }

    /// Append a row.
    pub fn push_row(&mut self, row: &[f64]) -> Result<()> {
        if row.len() != self.n_cols {
            return Err(MailclassError::shape_mismatch(format!(
                "row {} has {} values, expected {}",
                self.n_rows,
                row.len(),
                self.n_cols
            )));
        }
        self.data.extend_from_slice(row);
        self.n_rows += 1;
        Ok(())
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Borrow row `i`. Panics when out of range, like slice indexing.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    /// Mutably borrow row `i`.
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics, and a zero-width matrix still has rows.
        (0..self.n_rows).map(move |i| self.row(i))
    }

    /// Get a single cell.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    /// New matrix holding the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> FeatureMatrix {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        FeatureMatrix {
            data,
            n_rows: indices.len(),
            n_cols: self.n_cols,
        }
    }

    /// Convert into nested rows.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }
}

/// Encoded features: either fixed-width rows or variable-length index
/// sequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Features {
    /// One row of `nb_words` values per example.
    Matrix(FeatureMatrix),
    /// One sequence of 1-based vocabulary indices per example.
    Sequences(Vec<Vec<usize>>),
}

impl Features {
    /// Number of examples.
    pub fn len(&self) -> usize {
        match self {
            Features::Matrix(matrix) => matrix.n_rows(),
            Features::Sequences(sequences) => sequences.len(),
        }
    }

    /// Check if there are no examples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the variant, for logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Features::Matrix(_) => "matrix",
            Features::Sequences(_) => "sequences",
        }
    }

    /// Take the given examples, in order, keeping the variant.
    pub fn select(&self, indices: &[usize]) -> Features {
        match self {
            Features::Matrix(matrix) => Features::Matrix(matrix.select_rows(indices)),
            Features::Sequences(sequences) => {
                Features::Sequences(indices.iter().map(|&i| sequences[i].clone()).collect())
            }
        }
    }

    /// Borrow the matrix, or fail if these are sequences.
    pub fn as_matrix(&self) -> Result<&FeatureMatrix> {
        match self {
            Features::Matrix(matrix) => Ok(matrix),
            other => Err(MailclassError::shape_mismatch(format!(
                "expected matrix features, found {}",
                other.kind()
            ))),
        }
    }

    /// Borrow the sequences, or fail if this is a matrix.
    pub fn as_sequences(&self) -> Result<&[Vec<usize>]> {
        match self {
            Features::Sequences(sequences) => Ok(sequences),
            other => Err(MailclassError::shape_mismatch(format!(
                "expected sequence features, found {}",
                other.kind()
            ))),
        }
    }
}

/// Features, integer labels, and the names that give them meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedDataset {
    /// Encoded examples.
    pub features: Features,
    /// Label index per example, in `[0, label_names.len())`.
    pub labels: Vec<usize>,
    /// Name of each feature column (the vocabulary, in index order).
    pub feature_names: Vec<String>,
    /// Label names; position is the label index.
    pub label_names: Vec<String>,
}

impl EncodedDataset {
    /// Number of examples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if there are no examples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of label classes.
    pub fn num_labels(&self) -> usize {
        self.label_names.len()
    }

    /// Check the internal consistency of the dataset.
    pub fn validate(&self) -> Result<()> {
        if self.features.len() != self.labels.len() {
            return Err(MailclassError::shape_mismatch(format!(
                "{} feature rows but {} labels",
                self.features.len(),
                self.labels.len()
            )));
        }
        if let Features::Matrix(matrix) = &self.features
            && matrix.n_cols() != self.feature_names.len()
        {
            return Err(MailclassError::shape_mismatch(format!(
                "{} feature columns but {} feature names",
                matrix.n_cols(),
                self.feature_names.len()
            )));
        }
        if let Some(&max) = self.labels.iter().max()
            && max >= self.label_names.len()
        {
            return Err(MailclassError::shape_mismatch(format!(
                "label index {max} out of range for {} label names",
                self.label_names.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_rows_and_select() {
        let matrix =
            FeatureMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]], 2)
                .unwrap();
        assert_eq!(matrix.n_rows(), 3);
        assert_eq!(matrix.get(1, 1), 4.0);

        let selected = matrix.select_rows(&[2, 0]);
        assert_eq!(selected.to_rows(), vec![vec![5.0, 6.0], vec![1.0, 2.0]]);
    }

    #[test]
    fn test_matrix_rejects_ragged_rows() {
        let result = FeatureMatrix::from_rows(vec![vec![1.0], vec![1.0, 2.0]], 1);
        assert!(matches!(result, Err(MailclassError::ShapeMismatch(_))));
    }

    #[test]
    fn test_zero_width_matrix_has_rows() {
        let matrix = FeatureMatrix::zeros(3, 0);
        assert_eq!(matrix.rows().count(), 3);
    }

    #[test]
    fn test_features_select_keeps_variant() {
        let features = Features::Sequences(vec![vec![1], vec![2, 3], vec![4]]);
        let selected = features.select(&[1]);
        assert_eq!(selected, Features::Sequences(vec![vec![2, 3]]));
        assert!(selected.as_matrix().is_err());
        assert_eq!(selected.as_sequences().unwrap().len(), 1);
    }

    #[test]
    fn test_dataset_validate() {
        let mut dataset = EncodedDataset {
            features: Features::Matrix(FeatureMatrix::zeros(2, 1)),
            labels: vec![0, 1],
            feature_names: vec!["a".to_string()],
            label_names: vec!["x".to_string(), "y".to_string()],
        };
        assert!(dataset.validate().is_ok());

        dataset.labels[1] = 2;
        assert!(matches!(
            dataset.validate(),
            Err(MailclassError::ShapeMismatch(_))
        ));

        dataset.labels = vec![0];
        assert!(dataset.validate().is_err());
    }
}
