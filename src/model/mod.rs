//! Classifier evaluation on partitioned datasets.
//!
//! Network mechanics live behind [`ClassifierBackend`]; this module owns the
//! epoch loop, validation and reporting shared by the [`mlp`] and
//! [`recurrent`] evaluators. [`gru`] holds the recurrent backend.

pub mod gru;
pub mod mlp;
pub mod observer;
pub mod recurrent;

pub use gru::GruNetwork;
pub use mlp::{MlpConfig, MlpNetwork, evaluate_dense_model, evaluate_mlp_model};
pub use observer::{EpochMetrics, EpochObserver, HistoryRecorder};
pub use recurrent::{
    PaddedSequences, RecurrentConfig, evaluate_recurrent_model, pad_sequences,
};

use log::info;
use serde::{Deserialize, Serialize};

use crate::dataset::FeatureMatrix;
use crate::error::{MailclassError, Result};

/// Loss and accuracy on one set of examples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean categorical cross-entropy.
    pub loss: f64,
    /// Fraction of examples whose arg-max prediction is the true class.
    pub accuracy: f64,
}

/// Outcome of training and testing one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Test loss.
    pub score: f64,
    /// Test accuracy.
    pub accuracy: f64,
    /// Predicted class per test example.
    pub predictions: Vec<usize>,
    /// Metrics of every training epoch.
    pub history: Vec<EpochMetrics>,
}

/// A trainable classifier over inputs of type `X`.
///
/// Targets are one-hot rows. Errors are reported through `anyhow` so that
/// backends wrapping other libraries can pass their errors through.
pub trait ClassifierBackend<X: ?Sized> {
    /// Set up the network for `input_dim` inputs and `num_classes` outputs.
    fn initialize(&mut self, input_dim: usize, num_classes: usize) -> anyhow::Result<()>;

    /// Train one pass over `x` in mini-batches and return the training
    /// loss and accuracy.
    fn fit_epoch(
        &mut self,
        x: &X,
        y: &FeatureMatrix,
        batch_size: usize,
    ) -> anyhow::Result<Evaluation>;

    /// Compute loss and accuracy without training.
    fn evaluate(&mut self, x: &X, y: &FeatureMatrix, batch_size: usize)
    -> anyhow::Result<Evaluation>;

    /// Arg-max class per example.
    fn predict_classes(&mut self, x: &X, batch_size: usize) -> anyhow::Result<Vec<usize>>;
}

/// Backend over fixed-width matrix rows.
pub trait DenseBackend: ClassifierBackend<FeatureMatrix> {}

impl<T: ClassifierBackend<FeatureMatrix>> DenseBackend for T {}

/// Backend over padded index sequences.
pub trait SequenceBackend: ClassifierBackend<PaddedSequences> {}

impl<T: ClassifierBackend<PaddedSequences>> SequenceBackend for T {}

/// Input and one-hot targets.
pub(crate) type Batch<'a, X> = (&'a X, &'a FeatureMatrix);

/// Epoch count and batch size of one training run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Schedule {
    pub epochs: usize,
    pub batch_size: usize,
}

/// Train for `schedule.epochs` epochs, then evaluate and predict on `test`.
pub(crate) fn run<X: ?Sized, B: ClassifierBackend<X> + ?Sized>(
    backend: &mut B,
    train: Batch<'_, X>,
    validation: Option<Batch<'_, X>>,
    test: Batch<'_, X>,
    schedule: Schedule,
    mut observer: Option<&mut dyn EpochObserver>,
) -> Result<EvaluationReport> {
    if let Some(observer) = observer.as_deref_mut() {
        observer.on_train_begin(schedule.epochs)?;
    }

    let mut history = Vec::with_capacity(schedule.epochs);
    for epoch in 0..schedule.epochs {
        let fitted = backend
            .fit_epoch(train.0, train.1, schedule.batch_size)
            .map_err(|e| MailclassError::model(format!("epoch {epoch}: {e:#}")))?;
        let validated = match validation {
            Some((x, y)) => Some(
                backend
                    .evaluate(x, y, schedule.batch_size)
                    .map_err(|e| MailclassError::model(format!("validation: {e:#}")))?,
            ),
            None => None,
        };

        let metrics = EpochMetrics {
            epoch,
            loss: fitted.loss,
            accuracy: fitted.accuracy,
            val_loss: validated.map(|v| v.loss),
            val_accuracy: validated.map(|v| v.accuracy),
        };
        info!(
            "Epoch {}/{}: loss {:.4}, acc {:.4}{}",
            epoch + 1,
            schedule.epochs,
            metrics.loss,
            metrics.accuracy,
            match validated {
                Some(v) => format!(", val_loss {:.4}, val_acc {:.4}", v.loss, v.accuracy),
                None => String::new(),
            }
        );
        if let Some(observer) = observer.as_deref_mut() {
            observer.on_epoch_end(&metrics)?;
        }
        history.push(metrics);
    }

    if let Some(observer) = observer.as_deref_mut() {
        observer.on_train_end()?;
    }

    let score = backend
        .evaluate(test.0, test.1, schedule.batch_size)
        .map_err(|e| MailclassError::model(format!("test evaluation: {e:#}")))?;
    let predictions = backend
        .predict_classes(test.0, schedule.batch_size)
        .map_err(|e| MailclassError::model(format!("prediction: {e:#}")))?;
    info!("Test score: {:.4}", score.loss);
    info!("Test accuracy: {:.4}", score.accuracy);

    Ok(EvaluationReport {
        score: score.loss,
        accuracy: score.accuracy,
        predictions,
        history,
    })
}

/// Mean cross-entropy and accuracy of softmax outputs against one-hot
/// targets.
pub(crate) fn score_probabilities(probabilities: &[Vec<f64>], targets: &FeatureMatrix) -> Evaluation {
    if probabilities.is_empty() {
        return Evaluation {
            loss: 0.0,
            accuracy: 0.0,
        };
    }

    let mut loss = 0.0;
    let mut correct = 0usize;
    for (row, target) in probabilities.iter().zip(targets.rows()) {
        for (&p, &t) in row.iter().zip(target) {
            if t > 0.0 {
                loss -= t * p.clamp(1e-7, 1.0).ln();
            }
        }
        if argmax(row) == argmax(target) {
            correct += 1;
        }
    }
    let n = probabilities.len() as f64;
    Evaluation {
        loss: loss / n,
        accuracy: correct as f64 / n,
    }
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7]), 1);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn test_score_probabilities() {
        let targets = FeatureMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 2).unwrap();
        let probabilities = vec![vec![0.8, 0.2], vec![0.6, 0.4]];

        let evaluation = score_probabilities(&probabilities, &targets);
        assert_eq!(evaluation.accuracy, 0.5);
        let expected = -(0.8f64.ln() + 0.4f64.ln()) / 2.0;
        assert!((evaluation.loss - expected).abs() < 1e-12);
    }

    /// Always predicts class 0 and counts calls.
    #[derive(Default)]
    struct ConstantBackend {
        fitted: usize,
        classes: usize,
    }

    impl ClassifierBackend<FeatureMatrix> for ConstantBackend {
        fn initialize(&mut self, _input_dim: usize, num_classes: usize) -> anyhow::Result<()> {
            self.classes = num_classes;
            Ok(())
        }

        fn fit_epoch(
            &mut self,
            x: &FeatureMatrix,
            y: &FeatureMatrix,
            batch_size: usize,
        ) -> anyhow::Result<Evaluation> {
            self.fitted += 1;
            self.evaluate(x, y, batch_size)
        }

        fn evaluate(
            &mut self,
            x: &FeatureMatrix,
            y: &FeatureMatrix,
            _batch_size: usize,
        ) -> anyhow::Result<Evaluation> {
            let mut row = vec![0.0; self.classes];
            row[0] = 1.0;
            Ok(score_probabilities(&vec![row; x.n_rows()], y))
        }

        fn predict_classes(&mut self, x: &FeatureMatrix, _batch_size: usize) -> anyhow::Result<Vec<usize>> {
            Ok(vec![0; x.n_rows()])
        }
    }

    #[test]
    fn test_run_notifies_observer() {
        let x = FeatureMatrix::zeros(4, 1);
        let y = FeatureMatrix::from_rows(
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]],
            2,
        )
        .unwrap();
        let mut backend = ConstantBackend::default();
        backend.initialize(1, 2).unwrap();
        let mut recorder = HistoryRecorder::new();

        let report = run(
            &mut backend,
            (&x, &y),
            Some((&x, &y)),
            (&x, &y),
            Schedule {
                epochs: 3,
                batch_size: 2,
            },
            Some(&mut recorder),
        )
        .unwrap();

        assert_eq!(backend.fitted, 3);
        assert_eq!(recorder.history().len(), 3);
        assert_eq!(report.history, recorder.history());
        assert_eq!(report.accuracy, 0.75);
        assert_eq!(report.predictions, vec![0; 4]);
        assert_eq!(report.history[0].val_accuracy, Some(0.75));
    }

    struct FailingBackend;

    impl ClassifierBackend<FeatureMatrix> for FailingBackend {
        fn initialize(&mut self, _: usize, _: usize) -> anyhow::Result<()> {
            Ok(())
        }

        fn fit_epoch(&mut self, _: &FeatureMatrix, _: &FeatureMatrix, _: usize) -> anyhow::Result<Evaluation> {
            anyhow::bail!("out of memory")
        }

        fn evaluate(&mut self, _: &FeatureMatrix, _: &FeatureMatrix, _: usize) -> anyhow::Result<Evaluation> {
            unreachable!()
        }

        fn predict_classes(&mut self, _: &FeatureMatrix, _: usize) -> anyhow::Result<Vec<usize>> {
            unreachable!()
        }
    }

    #[test]
    fn test_backend_failure_is_model_error() {
        let x = FeatureMatrix::zeros(1, 1);
        let y = FeatureMatrix::zeros(1, 1);
        let result = run(
            &mut FailingBackend,
            (&x, &y),
            None,
            (&x, &y),
            Schedule {
                epochs: 1,
                batch_size: 1,
            },
            None,
        );
        let err = result.unwrap_err();
        assert!(matches!(err, MailclassError::Model(_)));
        assert!(err.to_string().contains("out of memory"));
    }
}
