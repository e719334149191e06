//! Frequency-ranked vocabulary construction.
//!
//! Words are ranked by descending corpus frequency; ties keep the order in
//! which the words were first encountered. The word at position `i` gets
//! index `i + 1`, index 0 being reserved for "not in the vocabulary".

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use log::debug;

use crate::analysis::analyzer::Analyzer;
use crate::error::{MailclassError, Result};

/// A fixed-size word vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    /// Words in rank order.
    words: Vec<String>,
    /// Word -> 1-based index.
    index: AHashMap<String, usize>,
    /// Corpus frequency per word, in rank order.
    frequencies: Vec<usize>,
    /// Number of fitted documents containing each word, in rank order.
    document_frequencies: Vec<usize>,
    /// Number of documents the vocabulary was fitted on.
    document_count: usize,
}

impl Vocabulary {
    /// Number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words in index order: position `i` holds the word with index `i + 1`.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// 1-based index of a word.
    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// Word with the given 1-based index.
    pub fn word(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.words.get(i))
            .map(String::as_str)
    }

    /// Corpus frequency of the word with the given 1-based index.
    pub fn frequency(&self, index: usize) -> Option<usize> {
        index
            .checked_sub(1)
            .and_then(|i| self.frequencies.get(i))
            .copied()
    }

    /// Document frequency of the word with the given 1-based index.
    pub fn document_frequency(&self, index: usize) -> Option<usize> {
        index
            .checked_sub(1)
            .and_then(|i| self.document_frequencies.get(i))
            .copied()
    }

    /// Number of documents the vocabulary was fitted on.
    pub fn document_count(&self) -> usize {
        self.document_count
    }
}

/// Builds a [`Vocabulary`] of exactly `nb_words` words.
pub struct VocabularyBuilder {
    nb_words: usize,
    analyzer: Arc<dyn Analyzer>,
}

impl std::fmt::Debug for VocabularyBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VocabularyBuilder")
            .field("nb_words", &self.nb_words)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

impl VocabularyBuilder {
    /// Create a builder for `nb_words` words using the given analyzer.
    pub fn new(nb_words: usize, analyzer: Arc<dyn Analyzer>) -> Result<Self> {
        if nb_words == 0 {
            return Err(MailclassError::invalid_argument(
                "vocabulary size must be at least 1",
            ));
        }
        Ok(VocabularyBuilder { nb_words, analyzer })
    }

    /// Requested vocabulary size.
    pub fn nb_words(&self) -> usize {
        self.nb_words
    }

    /// Tokenize `texts` and fit on the result.
    pub fn fit(&self, texts: &[String]) -> Result<Vocabulary> {
        let documents = texts
            .iter()
            .map(|text| self.analyzer.words(text))
            .collect::<Result<Vec<_>>>()?;
        self.fit_tokens(&documents)
    }

    /// Fit on already tokenized documents.
    ///
    /// Fails with [`MailclassError::Configuration`] when the corpus has fewer
    /// than `nb_words` distinct words.
    pub fn fit_tokens(&self, documents: &[Vec<String>]) -> Result<Vocabulary> {
        // Slots keep first-encounter order; the map points words at slots.
        let mut slots: Vec<(String, usize, usize)> = Vec::new();
        let mut slot_of: AHashMap<&str, usize> = AHashMap::new();

        for document in documents {
            let mut seen: AHashSet<usize> = AHashSet::new();
            for word in document {
                let slot = match slot_of.get(word.as_str()) {
                    Some(&slot) => slot,
                    None => {
                        slots.push((word.clone(), 0, 0));
                        slot_of.insert(word.as_str(), slots.len() - 1);
                        slots.len() - 1
                    }
                };
                slots[slot].1 += 1;
                if seen.insert(slot) {
                    slots[slot].2 += 1;
                }
            }
        }

        if slots.len() < self.nb_words {
            return Err(MailclassError::configuration(format!(
                "requested {} vocabulary words but the corpus has only {} distinct words",
                self.nb_words,
                slots.len()
            )));
        }

        // sort_by is stable, so equal counts stay in first-encounter order.
        slots.sort_by(|a, b| b.1.cmp(&a.1));
        slots.truncate(self.nb_words);

        let mut words = Vec::with_capacity(self.nb_words);
        let mut frequencies = Vec::with_capacity(self.nb_words);
        let mut document_frequencies = Vec::with_capacity(self.nb_words);
        let mut index = AHashMap::with_capacity(self.nb_words);
        for (rank, (word, frequency, document_frequency)) in slots.into_iter().enumerate() {
            index.insert(word.clone(), rank + 1);
            words.push(word);
            frequencies.push(frequency);
            document_frequencies.push(document_frequency);
        }

        debug!(
            "Built vocabulary of {} words from {} documents",
            words.len(),
            documents.len()
        );

        Ok(Vocabulary {
            words,
            index,
            frequencies,
            document_frequencies,
            document_count: documents.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::StandardAnalyzer;

    fn builder(nb_words: usize) -> VocabularyBuilder {
        VocabularyBuilder::new(nb_words, Arc::new(StandardAnalyzer::new().unwrap())).unwrap()
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ranked_by_frequency() {
        let vocabulary = builder(3).fit(&texts(&["a b c", "a a b"])).unwrap();

        assert_eq!(vocabulary.words(), &["a", "b", "c"]);
        assert_eq!(vocabulary.index_of("a"), Some(1));
        assert_eq!(vocabulary.index_of("c"), Some(3));
        assert_eq!(vocabulary.frequency(1), Some(3));
        assert_eq!(vocabulary.document_frequency(1), Some(2));
        assert_eq!(vocabulary.document_frequency(3), Some(1));
        assert_eq!(vocabulary.document_count(), 2);
    }

    #[test]
    fn test_ties_keep_first_encounter_order() {
        let vocabulary = builder(4).fit(&texts(&["zeta alpha", "mid alpha zeta", "omega mid"])).unwrap();
        // zeta=2, alpha=2, mid=2 all tie; omega=1.
        assert_eq!(vocabulary.words(), &["zeta", "alpha", "mid", "omega"]);
    }

    #[test]
    fn test_truncates_to_requested_size() {
        let vocabulary = builder(2).fit(&texts(&["x y z", "y z", "z"])).unwrap();
        assert_eq!(vocabulary.words(), &["z", "y"]);
        assert_eq!(vocabulary.index_of("x"), None);
        assert_eq!(vocabulary.word(0), None);
        assert_eq!(vocabulary.word(2), Some("y"));
        assert_eq!(vocabulary.word(3), None);
    }

    #[test]
    fn test_index_is_bijection() {
        let corpus = texts(&[
            "the quick brown fox jumps over the lazy dog",
            "the dog sleeps",
            "quick quick fox",
        ]);
        let vocabulary = builder(6).fit(&corpus).unwrap();

        assert_eq!(vocabulary.len(), 6);
        let mut indices: Vec<usize> = vocabulary
            .words()
            .iter()
            .map(|w| vocabulary.index_of(w).unwrap())
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, (1..=6).collect::<Vec<_>>());

        for i in 1..vocabulary.len() {
            assert!(vocabulary.frequency(i).unwrap() >= vocabulary.frequency(i + 1).unwrap());
        }
    }

    #[test]
    fn test_too_few_distinct_words() {
        let result = builder(4).fit(&texts(&["a b", "a c"]));
        assert!(matches!(result, Err(MailclassError::Configuration(_))));
    }

    #[test]
    fn test_zero_size_rejected() {
        let result = VocabularyBuilder::new(0, Arc::new(StandardAnalyzer::new().unwrap()));
        assert!(matches!(result, Err(MailclassError::InvalidArgument(_))));
    }
}
