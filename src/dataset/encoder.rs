//! Encoding of tokenized texts against a [`Vocabulary`].
//!
//! # Matrix modes
//!
//! For a word with in-text count `c`, where `L` is the number of
//! in-vocabulary words in the text, `N` the number of documents the
//! vocabulary was fitted on and `df` how many of them contain the word:
//!
//! | mode     | value                                  |
//! |----------|----------------------------------------|
//! | `count`  | `c`                                    |
//! | `binary` | `1` if `c > 0`, else `0`               |
//! | `freq`   | `c / L`, a zero row when `L == 0`      |
//! | `tfidf`  | `(1 + ln c) * ln(1 + N / (1 + df))`    |
//!
//! Column `j` holds the word with vocabulary index `j + 1`.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::dataset::FeatureMatrix;
use crate::dataset::vocabulary::Vocabulary;
use crate::error::{MailclassError, Result};

/// How matrix cells are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatrixMode {
    /// Raw word counts.
    Count,
    /// Word presence.
    Binary,
    /// Counts divided by the number of in-vocabulary words.
    Freq,
    /// Log-scaled term frequency times smoothed inverse document frequency.
    Tfidf,
}

impl MatrixMode {
    /// Name used in cache file names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixMode::Count => "count",
            MatrixMode::Binary => "binary",
            MatrixMode::Freq => "freq",
            MatrixMode::Tfidf => "tfidf",
        }
    }
}

impl fmt::Display for MatrixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatrixMode {
    type Err = MailclassError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "count" => Ok(MatrixMode::Count),
            "binary" => Ok(MatrixMode::Binary),
            "freq" => Ok(MatrixMode::Freq),
            "tfidf" => Ok(MatrixMode::Tfidf),
            other => Err(MailclassError::invalid_argument(format!(
                "unknown matrix mode '{other}'"
            ))),
        }
    }
}

/// Encodes tokenized texts against a fitted vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct FeatureEncoder<'a> {
    vocabulary: &'a Vocabulary,
}

impl<'a> FeatureEncoder<'a> {
    /// Create an encoder for the given vocabulary.
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        FeatureEncoder { vocabulary }
    }

    /// Vocabulary indices of the in-vocabulary words, in text order.
    pub fn encode_sequence(&self, tokens: &[String]) -> Vec<usize> {
        tokens
            .iter()
            .filter_map(|word| self.vocabulary.index_of(word))
            .collect()
    }

    /// One index sequence per document.
    pub fn encode_sequences(&self, documents: &[Vec<String>]) -> Vec<Vec<usize>> {
        documents
            .iter()
            .map(|tokens| self.encode_sequence(tokens))
            .collect()
    }

    /// One `nb_words`-wide row for a document.
    pub fn encode_row(&self, tokens: &[String], mode: MatrixMode) -> Vec<f64> {
        let width = self.vocabulary.len();
        let mut counts = vec![0usize; width];
        let mut in_vocabulary = 0usize;
        for index in tokens.iter().filter_map(|w| self.vocabulary.index_of(w)) {
            counts[index - 1] += 1;
            in_vocabulary += 1;
        }

        let document_count = self.vocabulary.document_count() as f64;
        counts
            .iter()
            .enumerate()
            .map(|(column, &count)| {
                if count == 0 {
                    return 0.0;
                }
                let count = count as f64;
                match mode {
                    MatrixMode::Count => count,
                    MatrixMode::Binary => 1.0,
                    MatrixMode::Freq => count / in_vocabulary as f64,
                    MatrixMode::Tfidf => {
                        let df = self
                            .vocabulary
                            .document_frequency(column + 1)
                            .unwrap_or(0) as f64;
                        let tf = 1.0 + count.ln();
                        let idf = (1.0 + document_count / (1.0 + df)).ln();
                        tf * idf
                    }
                }
            })
            .collect()
    }

    /// Encode every document into a matrix.
    pub fn encode_matrix(&self, documents: &[Vec<String>], mode: MatrixMode) -> Result<FeatureMatrix> {
        let mut matrix = FeatureMatrix::with_columns(self.vocabulary.len());
        for tokens in documents {
            matrix.push_row(&self.encode_row(tokens, mode))?;
        }
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::{Analyzer, StandardAnalyzer};
    use crate::dataset::vocabulary::VocabularyBuilder;
    use std::sync::Arc;

    fn fit(nb_words: usize, corpus: &[&str]) -> (Vocabulary, Vec<Vec<String>>) {
        let analyzer = Arc::new(StandardAnalyzer::new().unwrap());
        let documents: Vec<Vec<String>> = corpus
            .iter()
            .map(|text| analyzer.words(text).unwrap())
            .collect();
        let vocabulary = VocabularyBuilder::new(nb_words, analyzer)
            .unwrap()
            .fit_tokens(&documents)
            .unwrap();
        (vocabulary, documents)
    }

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_count_matrix() {
        let (vocabulary, documents) = fit(3, &["a b c", "a a b"]);
        let matrix = FeatureEncoder::new(&vocabulary)
            .encode_matrix(&documents, MatrixMode::Count)
            .unwrap();
        assert_eq!(
            matrix.to_rows(),
            vec![vec![1.0, 1.0, 1.0], vec![2.0, 1.0, 0.0]]
        );
    }

    #[test]
    fn test_binary_values() {
        let (vocabulary, documents) = fit(3, &["a b c", "a a b", "d d d d d d"]);
        let matrix = FeatureEncoder::new(&vocabulary)
            .encode_matrix(&documents, MatrixMode::Binary)
            .unwrap();
        for row in matrix.rows() {
            assert!(row.iter().all(|&v| v == 0.0 || v == 1.0));
        }
    }

    #[test]
    fn test_freq_row_sums() {
        let (vocabulary, _) = fit(2, &["a b c", "a a b"]);
        let encoder = FeatureEncoder::new(&vocabulary);

        let row = encoder.encode_row(&tokens("a a b c zz"), MatrixMode::Freq);
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((row[0] - 2.0 / 3.0).abs() < 1e-12);

        let empty = encoder.encode_row(&tokens("zz yy"), MatrixMode::Freq);
        assert_eq!(empty, vec![0.0, 0.0]);
    }

    #[test]
    fn test_tfidf_formula() {
        let (vocabulary, _) = fit(3, &["a b c", "a a b"]);
        let row = FeatureEncoder::new(&vocabulary).encode_row(&tokens("a a c"), MatrixMode::Tfidf);

        // a: c=2, df=2; b: absent; c: c=1, df=1; N=2.
        let expected_a = (1.0 + 2f64.ln()) * (1.0 + 2.0 / 3.0f64).ln();
        let expected_c = 1.0 * (1.0 + 2.0 / 2.0f64).ln();
        assert!((row[0] - expected_a).abs() < 1e-12);
        assert_eq!(row[1], 0.0);
        assert!((row[2] - expected_c).abs() < 1e-12);
    }

    #[test]
    fn test_sequences_drop_unknown_words() {
        let (vocabulary, _) = fit(2, &["a b c", "a a b"]);
        let encoder = FeatureEncoder::new(&vocabulary);

        let sequence = encoder.encode_sequence(&tokens("c b x a b"));
        assert_eq!(sequence, vec![2, 1, 2]);
        assert!(sequence.iter().all(|&i| (1..=vocabulary.len()).contains(&i)));

        let sequences = encoder.encode_sequences(&[tokens("q"), tokens("a")]);
        assert_eq!(sequences, vec![vec![], vec![1]]);
    }

    #[test]
    fn test_mode_names() {
        for mode in [
            MatrixMode::Count,
            MatrixMode::Binary,
            MatrixMode::Freq,
            MatrixMode::Tfidf,
        ] {
            assert_eq!(mode.as_str().parse::<MatrixMode>().unwrap(), mode);
        }
        assert!("bm25".parse::<MatrixMode>().is_err());
    }
}
