//! Multilayer perceptron over matrix features.
//!
//! The network is `Dense(num_hidden) → ReLU → Dropout`, repeated
//! `1 + extra_layers` times, followed by `Dense(num_classes) → softmax`,
//! trained with categorical cross-entropy and Adam. Weights start from a
//! Glorot uniform draw and biases from zero.

use anyhow::{anyhow, bail};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dataset::FeatureMatrix;
use crate::error::{MailclassError, Result};
use crate::model::observer::EpochObserver;
use crate::model::{
    ClassifierBackend, DenseBackend, Evaluation, EvaluationReport, Schedule, argmax, run,
    score_probabilities,
};
use crate::partition::PartitionedDataset;

pub(crate) const BETA1: f64 = 0.9;
pub(crate) const BETA2: f64 = 0.999;
pub(crate) const EPSILON: f64 = 1e-7;

/// Settings of the multilayer perceptron evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpConfig {
    /// Width of every hidden layer.
    pub num_hidden: usize,
    /// Hidden layers beyond the first.
    pub extra_layers: usize,
    /// Dropout rate after each hidden layer.
    pub dropout: f64,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Training epochs.
    pub epochs: usize,
    /// Trailing fraction of the training data used for validation.
    pub validation_split: f64,
    /// Adam step size.
    pub learning_rate: f64,
    /// Seed for weight initialization, dropout and shuffling.
    pub seed: Option<u64>,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            num_hidden: 512,
            extra_layers: 0,
            dropout: 0.5,
            batch_size: 32,
            epochs: 5,
            validation_split: 0.1,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

impl MlpConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.num_hidden == 0 {
            return Err(MailclassError::configuration("mlp.num_hidden must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(MailclassError::configuration("mlp.batch_size must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(MailclassError::configuration(format!(
                "mlp.dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(MailclassError::configuration(format!(
                "mlp.validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        if !(self.learning_rate > 0.0) {
            return Err(MailclassError::configuration(format!(
                "mlp.learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Non-zero input values as `(column, value)` pairs.
pub(crate) type SparseRow = Vec<(usize, f64)>;

pub(crate) fn sparse_row(row: &[f64]) -> SparseRow {
    row.iter()
        .enumerate()
        .filter(|&(_, &v)| v != 0.0)
        .map(|(i, &v)| (i, v))
        .collect()
}

#[derive(Debug, Clone)]
struct DenseLayer {
    output_dim: usize,
    /// Row-major `input_dim × output_dim`.
    weights: Vec<f64>,
    bias: Vec<f64>,
    m_weights: Vec<f64>,
    v_weights: Vec<f64>,
    m_bias: Vec<f64>,
    v_bias: Vec<f64>,
}

impl DenseLayer {
    fn new(input_dim: usize, output_dim: usize, rng: &mut StdRng) -> Self {
        let limit = (6.0 / (input_dim + output_dim) as f64).sqrt();
        let weights: Vec<f64> = (0..input_dim * output_dim)
            .map(|_| rng.random_range(-limit..=limit))
            .collect();
        let size = weights.len();
        DenseLayer {
            output_dim,
            weights,
            bias: vec![0.0; output_dim],
            m_weights: vec![0.0; size],
            v_weights: vec![0.0; size],
            m_bias: vec![0.0; output_dim],
            v_bias: vec![0.0; output_dim],
        }
    }

    fn weight_row(&self, input: usize) -> &[f64] {
        &self.weights[input * self.output_dim..(input + 1) * self.output_dim]
    }

    fn forward_sparse(&self, input: &[(usize, f64)], out: &mut Vec<f64>) {
        out.clear();
        out.extend_from_slice(&self.bias);
        for &(i, value) in input {
            for (o, &w) in out.iter_mut().zip(self.weight_row(i)) {
                *o += value * w;
            }
        }
    }

    fn forward_dense(&self, input: &[f64], out: &mut Vec<f64>) {
        out.clear();
        out.extend_from_slice(&self.bias);
        for (i, &value) in input.iter().enumerate() {
            if value == 0.0 {
                continue;
            }
            for (o, &w) in out.iter_mut().zip(self.weight_row(i)) {
                *o += value * w;
            }
        }
    }

    fn adam_update(&mut self, gradients: &Gradients, scale: f64, step_size: f64) {
        adam_step(
            &mut self.weights,
            &mut self.m_weights,
            &mut self.v_weights,
            &gradients.weights,
            scale,
            step_size,
        );
        adam_step(
            &mut self.bias,
            &mut self.m_bias,
            &mut self.v_bias,
            &gradients.bias,
            scale,
            step_size,
        );
    }
}

pub(crate) fn adam_step(
    params: &mut [f64],
    m: &mut [f64],
    v: &mut [f64],
    gradients: &[f64],
    scale: f64,
    step_size: f64,
) {
    for (((p, m), v), &g) in params.iter_mut().zip(m).zip(v).zip(gradients) {
        let g = g * scale;
        *m = BETA1 * *m + (1.0 - BETA1) * g;
        *v = BETA2 * *v + (1.0 - BETA2) * g * g;
        *p -= step_size * *m / (v.sqrt() + EPSILON);
    }
}

#[derive(Debug, Clone)]
struct Gradients {
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl Gradients {
    fn zeros_like(layer: &DenseLayer) -> Self {
        Gradients {
            weights: vec![0.0; layer.weights.len()],
            bias: vec![0.0; layer.bias.len()],
        }
    }

    fn clear(&mut self) {
        self.weights.fill(0.0);
        self.bias.fill(0.0);
    }
}

/// Hidden activations and output probabilities of one example.
struct Trace {
    /// Post-activation output of each hidden layer.
    hidden: Vec<Vec<f64>>,
    /// `d activation / d pre-activation` of each hidden unit, including the
    /// dropout scale.
    factors: Vec<Vec<f64>>,
    output: Vec<f64>,
}

fn forward(layers: &[DenseLayer], input: &[(usize, f64)], mut dropout: Option<(&mut StdRng, f64)>) -> Trace {
    let mut hidden: Vec<Vec<f64>> = Vec::with_capacity(layers.len().saturating_sub(1));
    let mut factors = Vec::with_capacity(layers.len().saturating_sub(1));
    let mut output = Vec::new();

    for (l, layer) in layers.iter().enumerate() {
        let mut z = Vec::with_capacity(layer.output_dim);
        match hidden.last() {
            None => layer.forward_sparse(input, &mut z),
            Some(previous) => layer.forward_dense(previous, &mut z),
        }

        if l + 1 == layers.len() {
            output = softmax(z);
            break;
        }

        let mut factor = vec![0.0; z.len()];
        for (value, f) in z.iter_mut().zip(factor.iter_mut()) {
            if *value > 0.0 {
                *f = match &mut dropout {
                    Some((rng, rate)) => {
                        if rng.random::<f64>() < *rate {
                            0.0
                        } else {
                            1.0 / (1.0 - *rate)
                        }
                    }
                    None => 1.0,
                };
            }
            *value *= *f;
        }
        hidden.push(z);
        factors.push(factor);
    }

    Trace {
        hidden,
        factors,
        output,
    }
}

pub(crate) fn softmax(mut z: Vec<f64>) -> Vec<f64> {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for value in z.iter_mut() {
        *value = (*value - max).exp();
        sum += *value;
    }
    for value in z.iter_mut() {
        *value /= sum;
    }
    z
}

fn backward(
    layers: &[DenseLayer],
    input: &[(usize, f64)],
    trace: &Trace,
    target: &[f64],
    gradients: &mut [Gradients],
) {
    let mut delta: Vec<f64> = trace
        .output
        .iter()
        .zip(target)
        .map(|(p, t)| p - t)
        .collect();

    for l in (0..layers.len()).rev() {
        let layer = &layers[l];
        let grad = &mut gradients[l];
        for (b, d) in grad.bias.iter_mut().zip(&delta) {
            *b += d;
        }

        let out = layer.output_dim;
        let mut accumulate = |i: usize, value: f64| {
            for (g, d) in grad.weights[i * out..(i + 1) * out].iter_mut().zip(&delta) {
                *g += value * d;
            }
        };
        if l == 0 {
            for &(i, value) in input {
                accumulate(i, value);
            }
            break;
        }
        for (i, &value) in trace.hidden[l - 1].iter().enumerate() {
            if value != 0.0 {
                accumulate(i, value);
            }
        }

        delta = trace.factors[l - 1]
            .iter()
            .enumerate()
            .map(|(i, &factor)| {
                if factor == 0.0 {
                    return 0.0;
                }
                let back: f64 = layer
                    .weight_row(i)
                    .iter()
                    .zip(&delta)
                    .map(|(w, d)| w * d)
                    .sum();
                back * factor
            })
            .collect();
    }
}

fn matrix_input(
    x: &FeatureMatrix,
    input_dim: usize,
) -> anyhow::Result<impl Fn(usize) -> anyhow::Result<SparseRow> + '_> {
    if x.n_cols() != input_dim {
        return Err(anyhow!(
            "input has {} columns, network expects {}",
            x.n_cols(),
            input_dim
        ));
    }
    Ok(move |row: usize| Ok(sparse_row(x.row(row))))
}

pub(crate) fn cross_entropy(probabilities: &[f64], target: &[f64]) -> f64 {
    probabilities
        .iter()
        .zip(target)
        .filter(|&(_, &t)| t > 0.0)
        .map(|(&p, &t)| -t * p.clamp(EPSILON, 1.0).ln())
        .sum()
}

/// Feed-forward network trained with Adam.
#[derive(Debug, Clone)]
pub struct MlpNetwork {
    hidden_widths: Vec<usize>,
    dropout: f64,
    learning_rate: f64,
    rng: StdRng,
    layers: Vec<DenseLayer>,
    input_dim: usize,
    num_classes: usize,
    step: i32,
}

impl MlpNetwork {
    /// Create an uninitialized network with the configured architecture.
    pub fn new(config: &MlpConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_layers(
            vec![config.num_hidden; 1 + config.extra_layers],
            config.dropout,
            config.learning_rate,
            rng,
        )
    }

    /// Create an uninitialized network with explicit hidden widths.
    pub fn with_layers(hidden_widths: Vec<usize>, dropout: f64, learning_rate: f64, rng: StdRng) -> Self {
        MlpNetwork {
            hidden_widths,
            dropout,
            learning_rate,
            rng,
            layers: Vec::new(),
            input_dim: 0,
            num_classes: 0,
            step: 0,
        }
    }

    /// Input width set by the last initialization.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Widths of the hidden layers.
    pub fn hidden_widths(&self) -> &[usize] {
        &self.hidden_widths
    }

    /// Number of trainable weights and biases.
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.bias.len())
            .sum()
    }

    fn check_ready(&self, n: usize, y: Option<&FeatureMatrix>) -> anyhow::Result<()> {
        if self.layers.is_empty() {
            bail!("network is not initialized");
        }
        if let Some(y) = y {
            if y.n_rows() != n {
                bail!("{} inputs but {} targets", n, y.n_rows());
            }
            if y.n_cols() != self.num_classes {
                bail!("targets have {} columns, network has {} classes", y.n_cols(), self.num_classes);
            }
        }
        Ok(())
    }

    /// Train one shuffled pass over `n` examples produced by `input`.
    pub(crate) fn fit_rows<F>(&mut self, n: usize, input: F, y: &FeatureMatrix, batch_size: usize) -> anyhow::Result<Evaluation>
    where
        F: Fn(usize) -> anyhow::Result<SparseRow>,
    {
        self.check_ready(n, Some(y))?;
        if batch_size == 0 {
            bail!("batch size must be at least 1");
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut self.rng);
        let mut gradients: Vec<Gradients> = self.layers.iter().map(Gradients::zeros_like).collect();
        let mut loss = 0.0;
        let mut correct = 0usize;

        for batch in order.chunks(batch_size) {
            gradients.iter_mut().for_each(Gradients::clear);
            for &row in batch {
                let x = input(row)?;
                let target = y.row(row);
                let trace = forward(&self.layers, &x, Some((&mut self.rng, self.dropout)));
                loss += cross_entropy(&trace.output, target);
                if argmax(&trace.output) == argmax(target) {
                    correct += 1;
                }
                backward(&self.layers, &x, &trace, target, &mut gradients);
            }

            self.step += 1;
            let step_size = self.learning_rate * (1.0 - BETA2.powi(self.step)).sqrt()
                / (1.0 - BETA1.powi(self.step));
            let scale = 1.0 / batch.len() as f64;
            for (layer, grad) in self.layers.iter_mut().zip(&gradients) {
                layer.adam_update(grad, scale, step_size);
            }
        }

        if n == 0 {
            return Ok(Evaluation {
                loss: 0.0,
                accuracy: 0.0,
            });
        }
        Ok(Evaluation {
            loss: loss / n as f64,
            accuracy: correct as f64 / n as f64,
        })
    }

    /// Softmax outputs for `n` examples produced by `input`, without dropout.
    pub(crate) fn probabilities<F>(&self, n: usize, input: F) -> anyhow::Result<Vec<Vec<f64>>>
    where
        F: Fn(usize) -> anyhow::Result<SparseRow>,
    {
        self.check_ready(n, None)?;
        (0..n)
            .map(|row| Ok(forward(&self.layers, &input(row)?, None).output))
            .collect()
    }
}

impl ClassifierBackend<FeatureMatrix> for MlpNetwork {
    fn initialize(&mut self, input_dim: usize, num_classes: usize) -> anyhow::Result<()> {
        if num_classes == 0 {
            bail!("at least one class is required");
        }
        let mut dims = Vec::with_capacity(self.hidden_widths.len() + 2);
        dims.push(input_dim);
        dims.extend_from_slice(&self.hidden_widths);
        dims.push(num_classes);

        self.layers = dims
            .windows(2)
            .map(|pair| DenseLayer::new(pair[0], pair[1], &mut self.rng))
            .collect();
        self.input_dim = input_dim;
        self.num_classes = num_classes;
        self.step = 0;
        debug!(
            "Initialized network {:?} with {} parameters",
            dims,
            self.parameter_count()
        );
        Ok(())
    }

    fn fit_epoch(&mut self, x: &FeatureMatrix, y: &FeatureMatrix, batch_size: usize) -> anyhow::Result<Evaluation> {
        let input = matrix_input(x, self.input_dim)?;
        self.fit_rows(x.n_rows(), input, y, batch_size)
    }

    fn evaluate(&mut self, x: &FeatureMatrix, y: &FeatureMatrix, _batch_size: usize) -> anyhow::Result<Evaluation> {
        self.check_ready(x.n_rows(), Some(y))?;
        let probabilities = self.probabilities(x.n_rows(), matrix_input(x, self.input_dim)?)?;
        Ok(score_probabilities(&probabilities, y))
    }

    fn predict_classes(&mut self, x: &FeatureMatrix, _batch_size: usize) -> anyhow::Result<Vec<usize>> {
        let probabilities = self.probabilities(x.n_rows(), matrix_input(x, self.input_dim)?)?;
        Ok(probabilities.iter().map(|p| argmax(p)).collect())
    }
}

/// Train the configured perceptron on `parts.train` and evaluate it on
/// `parts.test`.
pub fn evaluate_mlp_model(
    parts: &PartitionedDataset,
    num_classes: usize,
    config: &MlpConfig,
    observer: Option<&mut dyn EpochObserver>,
) -> Result<EvaluationReport> {
    config.validate()?;
    let mut network = MlpNetwork::new(config);
    evaluate_dense_model(&mut network, parts, num_classes, config, observer)
}

/// Run the perceptron training schedule with any dense backend.
///
/// The last `validation_split` of the training examples are held out and
/// scored after every epoch.
pub fn evaluate_dense_model(
    backend: &mut dyn DenseBackend,
    parts: &PartitionedDataset,
    num_classes: usize,
    config: &MlpConfig,
    observer: Option<&mut dyn EpochObserver>,
) -> Result<EvaluationReport> {
    if num_classes != parts.num_labels {
        return Err(MailclassError::shape_mismatch(format!(
            "{num_classes} classes requested, labels are one-hot encoded with {}",
            parts.num_labels
        )));
    }
    let x_train = parts.train.features.as_matrix()?;
    let x_test = parts.test.features.as_matrix()?;

    let n = x_train.n_rows();
    let fit_size = (n as f64 * (1.0 - config.validation_split)).floor() as usize;
    if fit_size == 0 {
        return Err(MailclassError::invalid_argument(format!(
            "{n} training examples leave nothing to train on after the validation split"
        )));
    }
    let fit_rows: Vec<usize> = (0..fit_size).collect();
    let val_rows: Vec<usize> = (fit_size..n).collect();
    let x_fit = x_train.select_rows(&fit_rows);
    let y_fit = parts.train.one_hot.select_rows(&fit_rows);
    let x_val = x_train.select_rows(&val_rows);
    let y_val = parts.train.one_hot.select_rows(&val_rows);

    info!(
        "{} train, {} validation, {} test examples with {} features",
        fit_size,
        val_rows.len(),
        x_test.n_rows(),
        x_train.n_cols()
    );
    backend
        .initialize(x_train.n_cols(), num_classes)
        .map_err(|e| MailclassError::model(format!("{e:#}")))?;

    let validation = if val_rows.is_empty() {
        None
    } else {
        Some((&x_val, &y_val))
    };
    run(
        backend,
        (&x_fit, &y_fit),
        validation,
        (x_test, &parts.test.one_hot),
        Schedule {
            epochs: config.epochs,
            batch_size: config.batch_size,
        },
        observer,
    )
}
