//! On-disk cache of encoded datasets.
//!
//! Each artifact is a group of files sharing the [`CacheKey`] stem:
//!
//! - the data file, tabular ([`tabular`]) for matrices or line based
//!   ([`sequence`]) for sequences
//! - `<stem>.info.txt` with the label names
//! - `<stem>.vocab.txt` with the vocabulary (sequence caches only, since the
//!   tabular header already names every column)
//! - `<stem>.manifest.json` tying the files to the key with checksums
//!
//! The manifest is written last. Artifacts are never invalidated
//! automatically; a stale or damaged artifact is reported as a
//! [`MailclassError::CacheFormat`] and left on disk.

pub mod info;
pub mod key;
pub mod manifest;
pub mod sequence;
pub mod tabular;

pub use key::CacheKey;
pub use manifest::CacheManifest;
pub use sequence::LineFormat;
pub use tabular::{Table, TabularFormat};

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::dataset::{EncodedDataset, FeatureKind, Features};
use crate::email::BinaryCsvExporter;
use crate::error::{MailclassError, Result};

/// Reads and writes dataset artifacts in one directory.
#[derive(Debug, Clone)]
pub struct DatasetCache {
    dir: PathBuf,
    tabular: TabularFormat,
    lines: LineFormat,
}

impl DatasetCache {
    /// Create a cache rooted at `dir`. The directory is created on first
    /// store.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        DatasetCache {
            dir: dir.into(),
            tabular: TabularFormat::new(),
            lines: LineFormat::new(),
        }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the data file for `key`.
    pub fn data_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.data_file_name())
    }

    fn info_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.info_file_name())
    }

    fn vocabulary_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.vocabulary_file_name())
    }

    fn manifest_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.manifest_file_name())
    }

    /// Check if an artifact exists for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.data_path(key).is_file()
    }

    /// Load the artifact stored under `key`, or `None` when there is none.
    pub fn load(&self, key: &CacheKey) -> Result<Option<EncodedDataset>> {
        let data_path = self.data_path(key);
        if !data_path.is_file() {
            debug!("No cache artifact at {}", data_path.display());
            return Ok(None);
        }

        let manifest_path = self.manifest_path(key);
        if !manifest_path.is_file() {
            return Err(MailclassError::cache_format(format!(
                "{} exists without manifest {}",
                data_path.display(),
                manifest_path.display()
            )));
        }
        let info_path = self.info_path(key);
        let vocabulary_path = self.vocabulary_path(key);
        let vocabulary = match key.kind {
            FeatureKind::Matrix(_) => None,
            FeatureKind::Sequences => Some(vocabulary_path.as_path()),
        };
        let manifest = CacheManifest::read(&manifest_path)?;
        manifest.verify(key, &data_path, &info_path, vocabulary)?;

        let label_names = info::read_label_names(&info_path)?;
        let dataset = match key.kind {
            FeatureKind::Matrix(_) => {
                let table = self.tabular.read(&data_path)?;
                EncodedDataset {
                    features: Features::Matrix(table.matrix),
                    labels: table.labels,
                    feature_names: table.feature_names,
                    label_names,
                }
            }
            FeatureKind::Sequences => {
                let (sequences, labels) = self.lines.read(&data_path)?;
                EncodedDataset {
                    features: Features::Sequences(sequences),
                    labels,
                    feature_names: info::read_words(&vocabulary_path)?,
                    label_names,
                }
            }
        };

        if dataset.len() != manifest.rows {
            return Err(MailclassError::cache_format(format!(
                "{} holds {} examples, manifest records {}",
                data_path.display(),
                dataset.len(),
                manifest.rows
            )));
        }
        if dataset.feature_names.len() != key.nb_words {
            return Err(MailclassError::cache_format(format!(
                "{} names {} features, key expects {}",
                data_path.display(),
                dataset.feature_names.len(),
                key.nb_words
            )));
        }
        dataset
            .validate()
            .map_err(|e| MailclassError::cache_format(format!("{}: {e}", data_path.display())))?;

        info!(
            "Loaded {} examples from cache {}",
            dataset.len(),
            data_path.display()
        );
        Ok(Some(dataset))
    }

    /// Persist `dataset` under `key`, replacing any previous artifact.
    ///
    /// Everything that can be rejected is checked before the first file is
    /// written. If writing fails part way, the partial artifact is removed.
    pub fn store(&self, key: &CacheKey, dataset: &EncodedDataset) -> Result<()> {
        dataset.validate()?;
        if dataset.feature_names.len() != key.nb_words {
            return Err(MailclassError::shape_mismatch(format!(
                "dataset has {} features, key '{key}' expects {}",
                dataset.feature_names.len(),
                key.nb_words
            )));
        }
        match (&dataset.features, key.kind) {
            (Features::Matrix(_), FeatureKind::Matrix(_)) => {}
            (Features::Sequences(_), FeatureKind::Sequences) => {
                info::check_words(&dataset.feature_names)?;
            }
            (features, _) => {
                return Err(MailclassError::shape_mismatch(format!(
                    "cannot store {} features under key '{key}'",
                    features.kind()
                )));
            }
        }
        info::check_label_names(&dataset.label_names)?;
        fs::create_dir_all(&self.dir)?;

        if let Err(e) = self.write_artifact(key, dataset) {
            warn!("Storing {key} failed, removing partial artifact: {e}");
            self.remove(key)?;
            return Err(e);
        }
        info!("Stored cache artifact {key} in {}", self.dir.display());
        Ok(())
    }

    fn write_artifact(&self, key: &CacheKey, dataset: &EncodedDataset) -> Result<()> {
        let data_path = self.data_path(key);
        let info_path = self.info_path(key);
        let vocabulary_path = self.vocabulary_path(key);
        // A stale manifest must not vouch for files that are being replaced.
        self.remove(key)?;

        let (rows, vocabulary) = match &dataset.features {
            Features::Matrix(matrix) => {
                self.tabular
                    .write(&data_path, matrix, &dataset.labels, &dataset.feature_names)?;
                (matrix.n_rows(), None)
            }
            Features::Sequences(sequences) => {
                self.lines.write(&data_path, sequences, &dataset.labels)?;
                info::write_words(&vocabulary_path, &dataset.feature_names)?;
                (
                    sequences.iter().filter(|s| !s.is_empty()).count(),
                    Some(vocabulary_path.as_path()),
                )
            }
        };
        info::write_label_names(&info_path, &dataset.label_names)?;

        CacheManifest::new(key.clone(), rows, &data_path, &info_path, vocabulary)?
            .write(&self.manifest_path(key))
    }

    /// Return the cached dataset for `key`, building and storing it first
    /// when absent.
    pub fn load_or_build<F>(&self, key: &CacheKey, build: F) -> Result<EncodedDataset>
    where
        F: FnOnce() -> Result<EncodedDataset>,
    {
        if let Some(dataset) = self.load(key)? {
            return Ok(dataset);
        }

        info!("Cache miss for {key}, building dataset");
        let mut dataset = build()?;
        drop_empty_sequences(&mut dataset);
        self.store(key, &dataset)?;
        Ok(dataset)
    }

    /// Delete every file belonging to `key`. Missing files are ignored.
    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        for path in [
            self.manifest_path(key),
            self.data_path(key),
            self.info_path(key),
            self.vocabulary_path(key),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Remove examples whose sequence is empty, since the line format cannot
/// carry them.
fn drop_empty_sequences(dataset: &mut EncodedDataset) {
    let Features::Sequences(sequences) = &mut dataset.features else {
        return;
    };
    let keep: Vec<bool> = sequences.iter().map(|s| !s.is_empty()).collect();
    let dropped = keep.iter().filter(|&&k| !k).count();
    if dropped == 0 {
        return;
    }

    dataset.labels = dataset
        .labels
        .iter()
        .zip(&keep)
        .filter(|&(_, &k)| k)
        .map(|(&label, _)| label)
        .collect();
    sequences.retain(|s| !s.is_empty());
    warn!("Dropped {dropped} emails with no in-vocabulary words");
}

fn export_stem(per_label: bool) -> &'static str {
    if per_label {
        "export_per-label"
    } else {
        "export_all"
    }
}

/// Load a dataset produced by an external [`BinaryCsvExporter`], running the
/// export first when its CSV is not in `dir` yet.
///
/// When no label-name file exists, label `i` is named `"i"` for every `i`
/// up to the largest label.
pub fn load_exported_dataset(
    exporter: &dyn BinaryCsvExporter,
    dir: &Path,
    per_label: bool,
) -> Result<EncodedDataset> {
    let stem = export_stem(per_label);
    let data_path = dir.join(format!("{stem}.csv"));
    let info_path = dir.join(format!("{stem}.info.txt"));

    if !data_path.is_file() {
        fs::create_dir_all(dir)?;
        info!("Exporting binary CSV to {}", data_path.display());
        exporter.export(&data_path, per_label)?;
    }
    let table = TabularFormat::new().read(&data_path)?;

    let label_names = if info_path.is_file() {
        info::read_label_names(&info_path)?
    } else {
        let names: Vec<String> = match table.labels.iter().max() {
            Some(&max) => (0..=max).map(|i| i.to_string()).collect(),
            None => Vec::new(),
        };
        info::write_label_names(&info_path, &names)?;
        names
    };

    let dataset = EncodedDataset {
        features: Features::Matrix(table.matrix),
        labels: table.labels,
        feature_names: table.feature_names,
        label_names,
    };
    dataset.validate()?;
    Ok(dataset)
}
