//! Per-epoch training callbacks.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metrics reported at the end of each epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Zero-based epoch number.
    pub epoch: usize,
    /// Mean training loss.
    pub loss: f64,
    /// Training accuracy.
    pub accuracy: f64,
    /// Loss on the validation data, when there is any.
    pub val_loss: Option<f64>,
    /// Accuracy on the validation data, when there is any.
    pub val_accuracy: Option<f64>,
}

/// Receives training progress.
pub trait EpochObserver {
    /// Called once before the first epoch.
    fn on_train_begin(&mut self, _epochs: usize) -> Result<()> {
        Ok(())
    }

    /// Called after every epoch.
    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<()>;

    /// Called once after the last epoch.
    fn on_train_end(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Collects epoch metrics and optionally writes them to a JSON file when
/// training ends, for plotting elsewhere.
#[derive(Debug, Clone, Default)]
pub struct HistoryRecorder {
    history: Vec<EpochMetrics>,
    save_to: Option<PathBuf>,
}

impl HistoryRecorder {
    /// Create a recorder that keeps metrics in memory only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also write the history to `path` at the end of training.
    pub fn save_to<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.save_to = Some(path.into());
        self
    }

    /// Metrics seen so far.
    pub fn history(&self) -> &[EpochMetrics] {
        &self.history
    }

    /// Write the history as JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(&self.history)?)?;
        Ok(())
    }

    /// Read a history written by [`HistoryRecorder::write`].
    pub fn read(path: &Path) -> Result<Vec<EpochMetrics>> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl EpochObserver for HistoryRecorder {
    fn on_train_begin(&mut self, _epochs: usize) -> Result<()> {
        self.history.clear();
        Ok(())
    }

    fn on_epoch_end(&mut self, metrics: &EpochMetrics) -> Result<()> {
        self.history.push(*metrics);
        Ok(())
    }

    fn on_train_end(&mut self) -> Result<()> {
        if let Some(path) = &self.save_to {
            self.write(path)?;
            info!("Saved training history to {}", path.display());
        }
        Ok(())
    }
}
