//! Gated recurrent sequence classifier.
//!
//! `Embedding(max_features, embedding_dim) → GRU(units) → Dropout →
//! Dense(num_classes) → softmax`, trained with categorical cross-entropy and
//! Adam through backpropagation in time. Only the last hidden state reaches
//! the dense layer. Every padded position is fed to the recurrence, padding
//! included, so index `0` owns an embedding row like any other index.
//!
//! ```text
//! z_t = σ(x_t W_z + h_{t-1} U_z + b_z)
//! r_t = σ(x_t W_r + h_{t-1} U_r + b_r)
//! n_t = tanh(x_t W_n + b_n + r_t ⊙ (h_{t-1} U_n))
//! h_t = (1 - z_t) ⊙ n_t + z_t ⊙ h_{t-1}
//! ```

use anyhow::bail;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::dataset::FeatureMatrix;
use crate::model::mlp::{BETA1, BETA2, adam_step, cross_entropy, softmax};
use crate::model::recurrent::{PaddedSequences, RecurrentConfig};
use crate::model::{ClassifierBackend, Evaluation, argmax, score_probabilities};

/// Embedding rows start uniform in `±EMBEDDING_INIT`.
const EMBEDDING_INIT: f64 = 0.05;

/// Trainable tensor with its gradient and Adam moments.
#[derive(Debug, Clone)]
struct Param {
    value: Vec<f64>,
    grad: Vec<f64>,
    m: Vec<f64>,
    v: Vec<f64>,
}

impl Param {
    fn from_values(value: Vec<f64>) -> Self {
        let size = value.len();
        Param {
            value,
            grad: vec![0.0; size],
            m: vec![0.0; size],
            v: vec![0.0; size],
        }
    }

    fn uniform(size: usize, limit: f64, rng: &mut StdRng) -> Self {
        Self::from_values((0..size).map(|_| rng.random_range(-limit..=limit)).collect())
    }

    /// Glorot uniform for a `fan_in × fan_out` kernel.
    fn glorot(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Self {
        Self::uniform(fan_in * fan_out, (6.0 / (fan_in + fan_out) as f64).sqrt(), rng)
    }

    fn zeros(size: usize) -> Self {
        Self::from_values(vec![0.0; size])
    }

    fn len(&self) -> usize {
        self.value.len()
    }

    fn apply(&mut self, scale: f64, step_size: f64) {
        adam_step(&mut self.value, &mut self.m, &mut self.v, &self.grad, scale, step_size);
        self.grad.fill(0.0);
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `out += value * row` for every row of a row-major matrix selected by a
/// non-zero input.
fn add_weighted_rows(out: &mut [f64], input: &[f64], matrix: &[f64]) {
    let width = out.len();
    for (k, &value) in input.iter().enumerate() {
        if value == 0.0 {
            continue;
        }
        for (o, &w) in out.iter_mut().zip(&matrix[k * width..(k + 1) * width]) {
            *o += value * w;
        }
    }
}

/// `grad[k] += input[k] ⊗ delta`, the outer-product update of a row-major
/// kernel.
fn add_outer(grad: &mut [f64], input: &[f64], delta: &[f64]) {
    let width = delta.len();
    for (k, &value) in input.iter().enumerate() {
        if value == 0.0 {
            continue;
        }
        for (g, &d) in grad[k * width..(k + 1) * width].iter_mut().zip(delta) {
            *g += value * d;
        }
    }
}

/// `out[k] = matrix[k] · delta` for every row.
fn rows_dot(matrix: &[f64], delta: &[f64], out: &mut [f64]) {
    let width = delta.len();
    for (k, o) in out.iter_mut().enumerate() {
        *o = matrix[k * width..(k + 1) * width]
            .iter()
            .zip(delta)
            .map(|(w, d)| w * d)
            .sum();
    }
}

/// Activations of one time step, kept for the backward pass.
struct StepTrace {
    index: usize,
    h_prev: Vec<f64>,
    z: Vec<f64>,
    r: Vec<f64>,
    n: Vec<f64>,
    /// `h_{t-1} U_n`, before the reset gate is applied.
    recurrent_n: Vec<f64>,
}

struct Trace {
    steps: Vec<StepTrace>,
    /// Last hidden state after dropout.
    hidden: Vec<f64>,
    /// Dropout scale per hidden unit.
    mask: Vec<f64>,
    output: Vec<f64>,
}

/// Sequence backend with an embedding, one GRU layer and a softmax output.
#[derive(Debug, Clone)]
pub struct GruNetwork {
    embedding_dim: usize,
    units: usize,
    dropout: f64,
    learning_rate: f64,
    rng: StdRng,
    vocabulary: usize,
    num_classes: usize,
    /// `vocabulary × embedding_dim`.
    embedding: Param,
    /// `embedding_dim × 3·units`, gate blocks ordered z, r, n.
    kernel: Param,
    /// `units × 3·units`, same block order.
    recurrent: Param,
    /// `3·units`.
    bias: Param,
    /// `units × num_classes`.
    dense: Param,
    dense_bias: Param,
    step: i32,
}

impl GruNetwork {
    /// Create an uninitialized network with the configured widths.
    pub fn new(config: &RecurrentConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        GruNetwork {
            embedding_dim: config.embedding_dim,
            units: config.units,
            dropout: config.dropout,
            learning_rate: config.learning_rate,
            rng,
            vocabulary: 0,
            num_classes: 0,
            embedding: Param::zeros(0),
            kernel: Param::zeros(0),
            recurrent: Param::zeros(0),
            bias: Param::zeros(0),
            dense: Param::zeros(0),
            dense_bias: Param::zeros(0),
            step: 0,
        }
    }

    /// Number of trainable values.
    pub fn parameter_count(&self) -> usize {
        self.params().iter().map(|p| p.len()).sum()
    }

    fn params(&self) -> [&Param; 6] {
        [
            &self.embedding,
            &self.kernel,
            &self.recurrent,
            &self.bias,
            &self.dense,
            &self.dense_bias,
        ]
    }

    fn params_mut(&mut self) -> [&mut Param; 6] {
        [
            &mut self.embedding,
            &mut self.kernel,
            &mut self.recurrent,
            &mut self.bias,
            &mut self.dense,
            &mut self.dense_bias,
        ]
    }

    fn check_ready(&self, x: &PaddedSequences, y: Option<&FeatureMatrix>) -> anyhow::Result<()> {
        if self.vocabulary == 0 {
            bail!("network is not initialized");
        }
        if let Some(y) = y {
            if y.n_rows() != x.n_rows() {
                bail!("{} inputs but {} targets", x.n_rows(), y.n_rows());
            }
            if y.n_cols() != self.num_classes {
                bail!("targets have {} columns, network has {} classes", y.n_cols(), self.num_classes);
            }
        }
        for (row, sequence) in x.rows().enumerate() {
            if let Some(&index) = sequence.iter().find(|&&i| i >= self.vocabulary) {
                bail!("index {index} in sequence {row} exceeds embedding size {}", self.vocabulary);
            }
        }
        Ok(())
    }

    fn embedding_row(&self, index: usize) -> &[f64] {
        &self.embedding.value[index * self.embedding_dim..(index + 1) * self.embedding_dim]
    }

    fn forward(&self, sequence: &[usize], mut dropout: Option<(&mut StdRng, f64)>) -> Trace {
        let units = self.units;
        let mut steps = Vec::with_capacity(sequence.len());
        let mut h = vec![0.0; units];
        let mut input_part = vec![0.0; 3 * units];
        let mut recurrent_part = vec![0.0; 3 * units];

        for &index in sequence {
            input_part.copy_from_slice(&self.bias.value);
            add_weighted_rows(&mut input_part, self.embedding_row(index), &self.kernel.value);
            recurrent_part.fill(0.0);
            add_weighted_rows(&mut recurrent_part, &h, &self.recurrent.value);

            let mut step = StepTrace {
                index,
                h_prev: h.clone(),
                z: vec![0.0; units],
                r: vec![0.0; units],
                n: vec![0.0; units],
                recurrent_n: recurrent_part[2 * units..].to_vec(),
            };
            for i in 0..units {
                step.z[i] = sigmoid(input_part[i] + recurrent_part[i]);
                step.r[i] = sigmoid(input_part[units + i] + recurrent_part[units + i]);
                step.n[i] = (input_part[2 * units + i] + step.r[i] * step.recurrent_n[i]).tanh();
                h[i] = (1.0 - step.z[i]) * step.n[i] + step.z[i] * step.h_prev[i];
            }
            steps.push(step);
        }

        let mask: Vec<f64> = match &mut dropout {
            Some((rng, rate)) if *rate > 0.0 => (0..units)
                .map(|_| {
                    if rng.random::<f64>() < *rate {
                        0.0
                    } else {
                        1.0 / (1.0 - *rate)
                    }
                })
                .collect(),
            _ => vec![1.0; units],
        };
        let hidden: Vec<f64> = h.iter().zip(&mask).map(|(h, m)| h * m).collect();

        let mut logits = self.dense_bias.value.clone();
        add_weighted_rows(&mut logits, &hidden, &self.dense.value);
        Trace {
            steps,
            hidden,
            mask,
            output: softmax(logits),
        }
    }

    /// Accumulate the cross-entropy gradient of one example into the
    /// parameter gradients.
    fn backward(&mut self, trace: &Trace, target: &[f64]) {
        let units = self.units;
        let delta: Vec<f64> = trace.output.iter().zip(target).map(|(p, t)| p - t).collect();
        add_outer(&mut self.dense.grad, &trace.hidden, &delta);
        for (g, d) in self.dense_bias.grad.iter_mut().zip(&delta) {
            *g += d;
        }

        let mut dh = vec![0.0; units];
        rows_dot(&self.dense.value, &delta, &mut dh);
        for (d, m) in dh.iter_mut().zip(&trace.mask) {
            *d *= m;
        }

        let mut d_input = vec![0.0; 3 * units];
        let mut d_recurrent = vec![0.0; 3 * units];
        let mut d_embedding = vec![0.0; self.embedding_dim];
        let mut dh_prev = vec![0.0; units];
        for step in trace.steps.iter().rev() {
            for i in 0..units {
                let (z, r, n) = (step.z[i], step.r[i], step.n[i]);
                let dn = dh[i] * (1.0 - z) * (1.0 - n * n);
                let dz = dh[i] * (step.h_prev[i] - n) * z * (1.0 - z);
                let dr = dn * step.recurrent_n[i] * r * (1.0 - r);
                d_input[i] = dz;
                d_input[units + i] = dr;
                d_input[2 * units + i] = dn;
                d_recurrent[i] = dz;
                d_recurrent[units + i] = dr;
                d_recurrent[2 * units + i] = dn * r;
            }

            for (g, d) in self.bias.grad.iter_mut().zip(&d_input) {
                *g += d;
            }
            let start = step.index * self.embedding_dim;
            let x = &self.embedding.value[start..start + self.embedding_dim];
            add_outer(&mut self.kernel.grad, x, &d_input);
            rows_dot(&self.kernel.value, &d_input, &mut d_embedding);
            for (g, d) in self.embedding.grad[start..start + self.embedding_dim]
                .iter_mut()
                .zip(&d_embedding)
            {
                *g += d;
            }

            add_outer(&mut self.recurrent.grad, &step.h_prev, &d_recurrent);
            rows_dot(&self.recurrent.value, &d_recurrent, &mut dh_prev);
            for ((d, prev), z) in dh.iter_mut().zip(&dh_prev).zip(&step.z) {
                *d = *d * z + prev;
            }
        }
    }

    fn probabilities(&self, x: &PaddedSequences) -> Vec<Vec<f64>> {
        x.rows().map(|sequence| self.forward(sequence, None).output).collect()
    }
}

impl ClassifierBackend<PaddedSequences> for GruNetwork {
    fn initialize(&mut self, input_dim: usize, num_classes: usize) -> anyhow::Result<()> {
        if input_dim == 0 || num_classes == 0 {
            bail!("embedding size and class count must be at least 1");
        }
        let (embedding_dim, units) = (self.embedding_dim, self.units);
        let rng = &mut self.rng;
        self.embedding = Param::uniform(input_dim * embedding_dim, EMBEDDING_INIT, rng);
        self.kernel = Param::glorot(embedding_dim, 3 * units, rng);
        self.recurrent = Param::glorot(units, 3 * units, rng);
        self.bias = Param::zeros(3 * units);
        self.dense = Param::glorot(units, num_classes, rng);
        self.dense_bias = Param::zeros(num_classes);
        self.vocabulary = input_dim;
        self.num_classes = num_classes;
        self.step = 0;
        debug!(
            "Initialized GRU network {}x{} -> {} -> {} with {} parameters",
            input_dim,
            embedding_dim,
            units,
            num_classes,
            self.parameter_count()
        );
        Ok(())
    }

    fn fit_epoch(&mut self, x: &PaddedSequences, y: &FeatureMatrix, batch_size: usize) -> anyhow::Result<Evaluation> {
        self.check_ready(x, Some(y))?;
        if batch_size == 0 {
            bail!("batch size must be at least 1");
        }

        let n = x.n_rows();
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut self.rng);
        let mut loss = 0.0;
        let mut correct = 0usize;

        for batch in order.chunks(batch_size) {
            for &row in batch {
                let mut rng = self.rng.clone();
                let trace = self.forward(x.row(row), Some((&mut rng, self.dropout)));
                self.rng = rng;
                let target = y.row(row);
                loss += cross_entropy(&trace.output, target);
                if argmax(&trace.output) == argmax(target) {
                    correct += 1;
                }
                self.backward(&trace, target);
            }

            self.step += 1;
            let step_size = self.learning_rate * (1.0 - BETA2.powi(self.step)).sqrt()
                / (1.0 - BETA1.powi(self.step));
            let scale = 1.0 / batch.len() as f64;
            for param in self.params_mut() {
                param.apply(scale, step_size);
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

    fn evaluate(&mut self, x: &PaddedSequences, y: &FeatureMatrix, _batch_size: usize) -> anyhow::Result<Evaluation> {
        self.check_ready(x, Some(y))?;
        Ok(score_probabilities(&self.probabilities(x), y))
    }

    fn predict_classes(&mut self, x: &PaddedSequences, _batch_size: usize) -> anyhow::Result<Vec<usize>> {
        self.check_ready(x, None)?;
        Ok(self.probabilities(x).iter().map(|p| argmax(p)).collect())
    }
}
