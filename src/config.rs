//! Configuration for dataset construction, caching, and evaluation.
//!
//! Every section has a `Default` matching the behavior of the command line
//! tool without flags, and the whole tree can be loaded from a JSON file where
//! missing fields fall back to those defaults:
//!
//! ```
//! use mailclass::config::MailclassConfig;
//!
//! let config: MailclassConfig =
//!     serde_json::from_str(r#"{"dataset": {"nb_words": 250}}"#).unwrap();
//! assert_eq!(config.dataset.nb_words, 250);
//! assert_eq!(config.dataset.test_split, 0.1);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::encoder::MatrixMode;
use crate::error::{MailclassError, Result};
use crate::model::mlp::MlpConfig;
use crate::model::recurrent::RecurrentConfig;

/// Dataset construction and partitioning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Vocabulary size.
    pub nb_words: usize,
    /// Matrix cell encoding.
    pub matrix_mode: MatrixMode,
    /// Labels with fewer than `floor(total * label_cutoff)` emails are dropped.
    pub label_cutoff: f64,
    /// Fraction of examples held out for testing.
    pub test_split: f64,
    /// Seed for the train/test permutation. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            nb_words: 1000,
            matrix_mode: MatrixMode::Binary,
            label_cutoff: 0.01,
            test_split: 0.1,
            seed: None,
        }
    }
}

impl DatasetConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.nb_words == 0 {
            return Err(MailclassError::configuration("nb_words must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.label_cutoff) {
            return Err(MailclassError::configuration(format!(
                "label_cutoff must be in [0, 1], got {}",
                self.label_cutoff
            )));
        }
        if !(0.0..=1.0).contains(&self.test_split) {
            return Err(MailclassError::configuration(format!(
                "test_split must be in [0, 1], got {}",
                self.test_split
            )));
        }
        Ok(())
    }
}

/// Where cache artifacts live and how they are named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding cache files.
    pub dir: PathBuf,
    /// File name prefix shared by every artifact.
    pub prefix: String,
    /// Optional extra key component, for datasets built from other inputs.
    pub variant: Option<String>,
    /// JSON snapshot of parsed emails. Relative paths resolve against `dir`,
    /// and the input fingerprint is inserted before the extension.
    pub email_snapshot: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            prefix: "emails".to_string(),
            variant: None,
            email_snapshot: PathBuf::from("parsed_emails.json"),
        }
    }
}

impl CacheConfig {
    /// Resolved location of the email snapshot for the input with the given
    /// fingerprint, e.g. `parsed_emails.1a2b3c4d.json`.
    pub fn email_snapshot_path(&self, fingerprint: u32) -> PathBuf {
        let base = if self.email_snapshot.is_absolute() {
            self.email_snapshot.clone()
        } else {
            self.dir.join(&self.email_snapshot)
        };
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match base.extension() {
            Some(ext) => format!("{stem}.{fingerprint:08x}.{}", ext.to_string_lossy()),
            None => format!("{stem}.{fingerprint:08x}"),
        };
        base.with_file_name(name)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailclassConfig {
    /// Dataset settings.
    pub dataset: DatasetConfig,
    /// Cache settings.
    pub cache: CacheConfig,
    /// Multilayer perceptron settings.
    pub mlp: MlpConfig,
    /// Recurrent network settings.
    pub recurrent: RecurrentConfig,
}

impl MailclassConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: MailclassConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.dataset.validate()?;
        self.mlp.validate()?;
        self.recurrent.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = MailclassConfig::default();
        assert_eq!(config.dataset.nb_words, 1000);
        assert_eq!(config.dataset.matrix_mode, MatrixMode::Binary);
        assert_eq!(config.dataset.label_cutoff, 0.01);
        assert_eq!(config.cache.prefix, "emails");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"dataset": {"matrix_mode": "tfidf", "seed": 7}, "mlp": {"num_hidden": 64}}"#,
        )
        .unwrap();

        let config = MailclassConfig::from_file(&path).unwrap();
        assert_eq!(config.dataset.matrix_mode, MatrixMode::Tfidf);
        assert_eq!(config.dataset.seed, Some(7));
        assert_eq!(config.dataset.nb_words, 1000);
        assert_eq!(config.mlp.num_hidden, 64);
        assert_eq!(config.mlp.epochs, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dataset = DatasetConfig {
            test_split: 1.5,
            ..DatasetConfig::default()
        };
        assert!(matches!(
            dataset.validate(),
            Err(MailclassError::Configuration(_))
        ));
    }

    #[test]
    fn test_snapshot_path_resolution() {
        let cache = CacheConfig {
            dir: PathBuf::from("/tmp/cache"),
            ..CacheConfig::default()
        };
        assert_eq!(
            cache.email_snapshot_path(0xbeef),
            PathBuf::from("/tmp/cache/parsed_emails.0000beef.json")
        );

        let cache = CacheConfig {
            email_snapshot: PathBuf::from("/data/snapshot"),
            ..cache
        };
        assert_eq!(
            cache.email_snapshot_path(1),
            PathBuf::from("/data/snapshot.00000001")
        );
    }
}
