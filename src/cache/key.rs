//! Cache keys and the file names derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::builder::FeatureKind;
use crate::dataset::encoder::MatrixMode;
use crate::error::{MailclassError, Result};

/// Identifies one cache artifact by the parameters that produced it.
///
/// File names are
/// `<prefix>_<nb_words>_<encoding>_c<cutoff>_s<source>[_<variant>]` plus a
/// suffix starting with `.`, where `<cutoff>` is the label cutoff in parts
/// per million and `<source>` the input fingerprint as eight hex digits.
/// Prefix and variant are limited to letters, digits and `-`, and every
/// other component sits at a fixed position, so distinct keys never share a
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Name prefix.
    pub prefix: String,
    /// Vocabulary size.
    pub nb_words: usize,
    /// Encoding of the cached features.
    pub kind: FeatureKind,
    /// Label cutoff the dataset was filtered with, in parts per million.
    pub label_cutoff_ppm: u32,
    /// Fingerprint of the emails the dataset was built from.
    pub source: u32,
    /// Optional extra discriminator.
    pub variant: Option<String>,
}

impl CacheKey {
    /// Create a key, validating the name components.
    pub fn new<S: Into<String>>(prefix: S, nb_words: usize, kind: FeatureKind) -> Result<Self> {
        let prefix = prefix.into();
        Self::check_component("prefix", &prefix)?;
        Ok(CacheKey {
            prefix,
            nb_words,
            kind,
            label_cutoff_ppm: 0,
            source: 0,
            variant: None,
        })
    }

    /// Record the label cutoff, a fraction in `[0, 1]`.
    pub fn with_label_cutoff(mut self, cutoff: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&cutoff) {
            return Err(MailclassError::invalid_argument(format!(
                "cache key label cutoff {cutoff} is outside [0, 1]"
            )));
        }
        self.label_cutoff_ppm = (cutoff * 1_000_000.0).round() as u32;
        Ok(self)
    }

    /// Record the fingerprint of the input emails, as returned by
    /// [`EmailSource::fingerprint`](crate::email::EmailSource::fingerprint).
    pub fn with_source(mut self, fingerprint: u32) -> Self {
        self.source = fingerprint;
        self
    }

    /// Add a variant component.
    pub fn with_variant<S: Into<String>>(mut self, variant: S) -> Result<Self> {
        let variant = variant.into();
        Self::check_component("variant", &variant)?;
        self.variant = Some(variant);
        Ok(self)
    }

    fn check_component(what: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(MailclassError::invalid_argument(format!(
                "cache key {what} must not be empty"
            )));
        }
        if let Some(bad) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
        {
            return Err(MailclassError::invalid_argument(format!(
                "cache key {what} '{value}' contains '{bad}'; use letters, digits or '-'"
            )));
        }
        Ok(())
    }

    /// Encoding component of the file name.
    pub fn encoding_name(&self) -> &'static str {
        match self.kind {
            FeatureKind::Matrix(mode) => mode.as_str(),
            FeatureKind::Sequences => "sequence",
        }
    }

    /// Matrix mode, when this key names a matrix cache.
    pub fn matrix_mode(&self) -> Option<MatrixMode> {
        match self.kind {
            FeatureKind::Matrix(mode) => Some(mode),
            FeatureKind::Sequences => None,
        }
    }

    /// Shared stem of every file belonging to this key.
    pub fn stem(&self) -> String {
        let mut stem = format!(
            "{}_{}_{}_c{}_s{:08x}",
            self.prefix,
            self.nb_words,
            self.encoding_name(),
            self.label_cutoff_ppm,
            self.source
        );
        if let Some(variant) = &self.variant {
            stem.push('_');
            stem.push_str(variant);
        }
        stem
    }

    /// Name of the features/labels file.
    pub fn data_file_name(&self) -> String {
        match self.kind {
            FeatureKind::Matrix(_) => format!("{}.csv", self.stem()),
            FeatureKind::Sequences => format!("{}.txt", self.stem()),
        }
    }

    /// Name of the label-name side-file.
    pub fn info_file_name(&self) -> String {
        format!("{}.info.txt", self.stem())
    }

    /// Name of the vocabulary side-file written for sequence caches.
    pub fn vocabulary_file_name(&self) -> String {
        format!("{}.vocab.txt", self.stem())
    }

    /// Name of the manifest file.
    pub fn manifest_file_name(&self) -> String {
        format!("{}.manifest.json", self.stem())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_file_names() {
        let key = CacheKey::new("emails", 1000, FeatureKind::Matrix(MatrixMode::Binary))
            .unwrap()
            .with_label_cutoff(0.01)
            .unwrap()
            .with_source(0x1a2b_3c4d);
        assert_eq!(key.data_file_name(), "emails_1000_binary_c10000_s1a2b3c4d.csv");
        assert_eq!(key.info_file_name(), "emails_1000_binary_c10000_s1a2b3c4d.info.txt");
        assert_eq!(
            key.manifest_file_name(),
            "emails_1000_binary_c10000_s1a2b3c4d.manifest.json"
        );

        let key = CacheKey::new("emails", 5000, FeatureKind::Sequences)
            .unwrap()
            .with_variant("v2")
            .unwrap();
        assert_eq!(key.data_file_name(), "emails_5000_sequence_c0_s00000000_v2.txt");
        assert_eq!(
            key.vocabulary_file_name(),
            "emails_5000_sequence_c0_s00000000_v2.vocab.txt"
        );
        assert_eq!(key.to_string(), "emails_5000_sequence_c0_s00000000_v2");
    }

    #[test]
    fn test_distinct_keys_distinct_names() {
        let mut names = HashSet::new();
        let mut keys = 0;
        for prefix in ["emails", "mail"] {
            for nb_words in [10, 100, 1000] {
                for kind in [
                    FeatureKind::Matrix(MatrixMode::Count),
                    FeatureKind::Matrix(MatrixMode::Binary),
                    FeatureKind::Matrix(MatrixMode::Freq),
                    FeatureKind::Matrix(MatrixMode::Tfidf),
                    FeatureKind::Sequences,
                ] {
                    for variant in [None, Some("a"), Some("info"), Some("s00000001")] {
                        for (cutoff, source) in [(0.0, 0), (0.01, 0), (0.0, 1), (0.05, 1)] {
                            let mut key = CacheKey::new(prefix, nb_words, kind)
                                .unwrap()
                                .with_label_cutoff(cutoff)
                                .unwrap()
                                .with_source(source);
                            if let Some(variant) = variant {
                                key = key.with_variant(variant).unwrap();
                            }
                            names.insert(key.data_file_name());
                            names.insert(key.info_file_name());
                            names.insert(key.vocabulary_file_name());
                            names.insert(key.manifest_file_name());
                            keys += 1;
                        }
                    }
                }
            }
        }
        assert_eq!(names.len(), keys * 4);
    }

    #[test]
    fn test_rejects_separator_in_components() {
        assert!(CacheKey::new("keras_data", 10, FeatureKind::Sequences).is_err());
        assert!(CacheKey::new("", 10, FeatureKind::Sequences).is_err());
        let key = CacheKey::new("ok", 10, FeatureKind::Sequences).unwrap();
        assert!(key.clone().with_variant("per/label").is_err());
        assert!(key.clone().with_variant("x.info").is_err());
        assert!(key.clone().with_label_cutoff(1.5).is_err());
        assert!(key.clone().with_label_cutoff(-0.1).is_err());
        assert!(key.with_label_cutoff(f64::NAN).is_err());
    }
}
