//! End-to-end dataset construction from parsed emails.

use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::{Analyzer, StandardAnalyzer};
use crate::config::DatasetConfig;
use crate::dataset::encoder::{FeatureEncoder, MatrixMode};
use crate::dataset::label_filter::LabelFilter;
use crate::dataset::vocabulary::{Vocabulary, VocabularyBuilder};
use crate::dataset::{EncodedDataset, Features};
use crate::email::{EmailRecord, EmailStats};
use crate::error::{MailclassError, Result};

/// Which encoding the builder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Fixed-width rows computed with the given mode.
    Matrix(MatrixMode),
    /// Vocabulary index sequences.
    Sequences,
}

/// Runs label filtering, vocabulary construction and encoding.
pub struct DatasetBuilder {
    config: DatasetConfig,
    analyzer: Arc<dyn Analyzer>,
}

impl std::fmt::Debug for DatasetBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetBuilder")
            .field("config", &self.config)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

impl DatasetBuilder {
    /// Create a builder using the [`StandardAnalyzer`].
    pub fn new(config: DatasetConfig) -> Result<Self> {
        Ok(Self::with_analyzer(
            config,
            Arc::new(StandardAnalyzer::new()?),
        ))
    }

    /// Create a builder with a custom analyzer.
    pub fn with_analyzer(config: DatasetConfig, analyzer: Arc<dyn Analyzer>) -> Self {
        DatasetBuilder { config, analyzer }
    }

    /// The configuration in use.
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Build the dataset.
    ///
    /// Emails whose label is filtered out contribute neither to the
    /// vocabulary nor to the output. Labels are numbered by first appearance
    /// among the retained labels.
    pub fn build(&self, emails: &[EmailRecord], kind: FeatureKind) -> Result<EncodedDataset> {
        let stats = EmailStats::from_emails(emails, self.analyzer.as_ref())?;
        stats.log_word_breakdown();

        let outcome = LabelFilter::new(self.config.label_cutoff)?.apply(emails, &stats.labels)?;
        if outcome.labels.is_empty() {
            return Err(MailclassError::configuration(format!(
                "no label reaches the cutoff of {} emails",
                outcome.cutoff
            )));
        }
        info!("Creating email dataset with labels {:?}", outcome.labels.names());

        let mut documents = Vec::new();
        let mut labels = Vec::new();
        for email in emails {
            let Some(label) = outcome.labels.index_of(&email.label) else {
                continue;
            };
            documents.push(self.analyzer.words(&email.feature_text())?);
            labels.push(label);
        }

        let vocabulary = self.fit_vocabulary(&documents)?;
        let encoder = FeatureEncoder::new(&vocabulary);
        let features = match kind {
            FeatureKind::Matrix(mode) => Features::Matrix(encoder.encode_matrix(&documents, mode)?),
            FeatureKind::Sequences => Features::Sequences(encoder.encode_sequences(&documents)),
        };

        let dataset = EncodedDataset {
            features,
            labels,
            feature_names: vocabulary.words().to_vec(),
            label_names: outcome.labels.into_names(),
        };
        dataset.validate()?;

        info!(
            "Encoded {} emails as {} over {} words",
            dataset.len(),
            dataset.features.kind(),
            vocabulary.len()
        );
        Ok(dataset)
    }

    fn fit_vocabulary(&self, documents: &[Vec<String>]) -> Result<Vocabulary> {
        VocabularyBuilder::new(self.config.nb_words, Arc::clone(&self.analyzer))?
            .fit_tokens(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(nb_words: usize, label_cutoff: f64) -> DatasetConfig {
        DatasetConfig {
            nb_words,
            label_cutoff,
            ..DatasetConfig::default()
        }
    }

    fn corpus() -> Vec<EmailRecord> {
        let mut emails = Vec::new();
        for i in 0..15 {
            emails.push(EmailRecord::new(
                "ops",
                Some("alert"),
                "corp",
                format!("disk {i} full"),
                "work",
            ));
        }
        for i in 0..4 {
            emails.push(EmailRecord::new(
                "mom",
                Some("dinner"),
                "home",
                format!("pasta night {i}"),
                "family",
            ));
        }
        emails.push(EmailRecord::new("spammer", None, "junk", "uniqueword", "spam"));
        emails
    }

    #[test]
    fn test_rare_label_removed_end_to_end() {
        let builder = DatasetBuilder::new(config(5, 0.1)).unwrap();
        let dataset = builder
            .build(&corpus(), FeatureKind::Matrix(MatrixMode::Count))
            .unwrap();

        assert_eq!(dataset.len(), 19);
        assert_eq!(dataset.label_names, vec!["work", "family"]);
        assert_eq!(dataset.labels.iter().filter(|&&l| l == 0).count(), 15);
        assert_eq!(dataset.labels.iter().filter(|&&l| l == 1).count(), 4);
        // Words from the removed label never reach the vocabulary.
        assert!(!dataset.feature_names.contains(&"uniqueword".to_string()));
        assert_eq!(dataset.features.as_matrix().unwrap().n_cols(), 5);
    }

    #[test]
    fn test_sequences_end_to_end() {
        let builder = DatasetBuilder::new(config(4, 0.0)).unwrap();
        let dataset = builder.build(&corpus(), FeatureKind::Sequences).unwrap();

        assert_eq!(dataset.len(), 20);
        let sequences = dataset.features.as_sequences().unwrap();
        for sequence in sequences {
            assert!(sequence.iter().all(|&i| (1..=4).contains(&i)));
        }
    }

    #[test]
    fn test_vocabulary_larger_than_corpus() {
        let builder = DatasetBuilder::new(config(10_000, 0.0)).unwrap();
        let result = builder.build(&corpus(), FeatureKind::Matrix(MatrixMode::Binary));
        assert!(matches!(result, Err(MailclassError::Configuration(_))));
    }

    #[test]
    fn test_all_labels_removed() {
        let emails = vec![
            EmailRecord::new("a", None, "x", "one two", "l1"),
            EmailRecord::new("b", None, "y", "three four", "l2"),
        ];
        let builder = DatasetBuilder::new(config(2, 1.0)).unwrap();
        let result = builder.build(&emails, FeatureKind::Sequences);
        assert!(matches!(result, Err(MailclassError::Configuration(_))));
    }
}
