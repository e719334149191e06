//! Sequence classification with padded index sequences.
//!
//! The evaluator pads every sequence to `maxlen`, hands the result to a
//! [`SequenceBackend`], and validates on the test set after each epoch. The
//! embedding and recurrent layers belong to the backend; the bundled one is
//! [`GruNetwork`](crate::model::gru::GruNetwork).

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{MailclassError, Result};
use crate::model::observer::EpochObserver;
use crate::model::{EvaluationReport, Schedule, SequenceBackend, run};
use crate::partition::PartitionedDataset;

/// Settings of the sequence evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrentConfig {
    /// Indices must be below this value; it is the embedding input size.
    pub max_features: usize,
    /// Sequences are padded and truncated to this length.
    pub maxlen: usize,
    /// Embedding width.
    pub embedding_dim: usize,
    /// Recurrent layer width.
    pub units: usize,
    /// Dropout rate after the recurrent layer.
    pub dropout: f64,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Training epochs.
    pub epochs: usize,
    /// Adam step size.
    pub learning_rate: f64,
    /// Seed for weight initialization, dropout and shuffling.
    pub seed: Option<u64>,
}

impl Default for RecurrentConfig {
    fn default() -> Self {
        Self {
            max_features: 20000,
            maxlen: 125,
            embedding_dim: 128,
            units: 400,
            dropout: 0.5,
            batch_size: 32,
            epochs: 15,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

impl RecurrentConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max_features", self.max_features),
            ("maxlen", self.maxlen),
            ("embedding_dim", self.embedding_dim),
            ("units", self.units),
            ("batch_size", self.batch_size),
        ] {
            if value == 0 {
                return Err(MailclassError::configuration(format!(
                    "recurrent.{name} must be at least 1"
                )));
            }
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(MailclassError::configuration(format!(
                "recurrent.dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.learning_rate > 0.0) {
            return Err(MailclassError::configuration(format!(
                "recurrent.learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Fixed-length index sequences, `0` marking padding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaddedSequences {
    data: Vec<usize>,
    n_rows: usize,
    maxlen: usize,
}

impl PaddedSequences {
    /// Number of sequences.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Length of every sequence.
    pub fn maxlen(&self) -> usize {
        self.maxlen
    }

    /// Borrow sequence `i`.
    pub fn row(&self, i: usize) -> &[usize] {
        &self.data[i * self.maxlen..(i + 1) * self.maxlen]
    }

    /// Iterate over sequences in order.
    pub fn rows(&self) -> impl Iterator<Item = &[usize]> {
        (0..self.n_rows).map(move |i| self.row(i))
    }
}

/// Pad with leading zeros and keep the last `maxlen` indices of longer
/// sequences.
pub fn pad_sequences(sequences: &[Vec<usize>], maxlen: usize) -> PaddedSequences {
    let mut data = vec![0; sequences.len() * maxlen];
    for (row, sequence) in data.chunks_mut(maxlen.max(1)).zip(sequences) {
        let kept = &sequence[sequence.len().saturating_sub(maxlen)..];
        row[maxlen - kept.len()..].copy_from_slice(kept);
    }
    PaddedSequences {
        data,
        n_rows: sequences.len(),
        maxlen,
    }
}

/// Pad the partitioned sequences, train `backend` with the test set as
/// validation data, and evaluate it on the test set.
pub fn evaluate_recurrent_model(
    backend: &mut dyn SequenceBackend,
    parts: &PartitionedDataset,
    num_classes: usize,
    config: &RecurrentConfig,
    observer: Option<&mut dyn EpochObserver>,
) -> Result<EvaluationReport> {
    config.validate()?;
    if num_classes != parts.num_labels {
        return Err(MailclassError::shape_mismatch(format!(
            "{num_classes} classes requested, labels are one-hot encoded with {}",
            parts.num_labels
        )));
    }
    let train = parts.train.features.as_sequences()?;
    let test = parts.test.features.as_sequences()?;
    if let Some(&max) = train.iter().chain(test).flatten().max()
        && max >= config.max_features
    {
        return Err(MailclassError::invalid_argument(format!(
            "sequence index {max} is not below max_features {}",
            config.max_features
        )));
    }

    info!("{} train sequences", train.len());
    info!("{} test sequences", test.len());
    info!("Pad sequences (samples x time) with maxlen {}", config.maxlen);
    let x_train = pad_sequences(train, config.maxlen);
    let x_test = pad_sequences(test, config.maxlen);

    backend
        .initialize(config.max_features, num_classes)
        .map_err(|e| MailclassError::model(format!("{e:#}")))?;
    run(
        backend,
        (&x_train, &parts.train.one_hot),
        Some((&x_test, &parts.test.one_hot)),
        (&x_test, &parts.test.one_hot),
        Schedule {
            epochs: config.epochs,
            batch_size: config.batch_size,
        },
        observer,
    )
}
