//! Random train/test partitioning with one-hot labels.

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::dataset::{EncodedDataset, FeatureMatrix, Features};
use crate::error::{MailclassError, Result};

/// One side of a partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Features of the examples in this split.
    pub features: Features,
    /// One-hot labels, `num_labels` wide.
    pub one_hot: FeatureMatrix,
    /// Integer labels.
    pub labels: Vec<usize>,
    /// Positions of these examples in the unpartitioned dataset.
    pub indices: Vec<usize>,
}

impl Split {
    /// Number of examples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the split holds no examples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Train and test splits of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionedDataset {
    /// Training examples.
    pub train: Split,
    /// Held-out examples.
    pub test: Split,
    /// Width of the one-hot vectors.
    pub num_labels: usize,
}

/// Splits datasets using an owned random generator.
#[derive(Debug, Clone)]
pub struct Partitioner {
    test_split: f64,
    rng: StdRng,
}

impl Partitioner {
    /// Create a partitioner seeded from OS entropy.
    pub fn new(test_split: f64) -> Result<Self> {
        Self::with_rng(test_split, StdRng::from_os_rng())
    }

    /// Create a partitioner with a fixed seed.
    pub fn with_seed(test_split: f64, seed: u64) -> Result<Self> {
        Self::with_rng(test_split, StdRng::seed_from_u64(seed))
    }

    /// Create a partitioner around an existing generator.
    pub fn with_rng(test_split: f64, rng: StdRng) -> Result<Self> {
        if !(0.0..=1.0).contains(&test_split) {
            return Err(MailclassError::invalid_argument(format!(
                "test split must be in [0, 1], got {test_split}"
            )));
        }
        Ok(Partitioner { test_split, rng })
    }

    /// Fraction of examples held out.
    pub fn test_split(&self) -> f64 {
        self.test_split
    }

    /// Partition an encoded dataset using its own label count.
    pub fn split_dataset(&mut self, dataset: &EncodedDataset) -> Result<PartitionedDataset> {
        self.split(&dataset.features, &dataset.labels, dataset.num_labels())
    }

    /// Permute the examples and cut off the first `floor(test_split * n)` as
    /// the test set.
    pub fn split(
        &mut self,
        features: &Features,
        labels: &[usize],
        num_labels: usize,
    ) -> Result<PartitionedDataset> {
        if features.len() != labels.len() {
            return Err(MailclassError::shape_mismatch(format!(
                "{} examples but {} labels",
                features.len(),
                labels.len()
            )));
        }

        let n = labels.len();
        let mut permutation: Vec<usize> = (0..n).collect();
        permutation.shuffle(&mut self.rng);
        let test_size = (self.test_split * n as f64).floor() as usize;
        let (test_indices, train_indices) = permutation.split_at(test_size);

        let train = make_split(features, labels, train_indices, num_labels)?;
        let test = make_split(features, labels, test_indices, num_labels)?;
        info!(
            "Partitioned {} examples into {} train and {} test",
            n,
            train.len(),
            test.len()
        );

        Ok(PartitionedDataset {
            train,
            test,
            num_labels,
        })
    }
}

fn make_split(
    features: &Features,
    labels: &[usize],
    indices: &[usize],
    num_labels: usize,
) -> Result<Split> {
    let labels: Vec<usize> = indices.iter().map(|&i| labels[i]).collect();
    Ok(Split {
        features: features.select(indices),
        one_hot: one_hot(&labels, num_labels)?,
        labels,
        indices: indices.to_vec(),
    })
}

/// One row per label with a single `1.0` at the label's column.
pub fn one_hot(labels: &[usize], num_labels: usize) -> Result<FeatureMatrix> {
    let mut matrix = FeatureMatrix::zeros(labels.len(), num_labels);
    for (row, &label) in labels.iter().enumerate() {
        if label >= num_labels {
            return Err(MailclassError::shape_mismatch(format!(
                "label {label} does not fit {num_labels} one-hot columns"
            )));
        }
        matrix.row_mut(row)[label] = 1.0;
    }
    Ok(matrix)
}
