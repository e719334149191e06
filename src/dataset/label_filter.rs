//! Removal of labels with too few emails.

use ahash::AHashMap;
use log::info;

use crate::email::EmailRecord;
use crate::error::{MailclassError, Result};

/// Ordered set of distinct label names. Position is the label index used by
/// every encoded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelSet {
    names: Vec<String>,
    index: AHashMap<String, usize>,
}

impl LabelSet {
    /// Create a label set, rejecting duplicate names.
    pub fn new(names: Vec<String>) -> Result<Self> {
        let mut index = AHashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(MailclassError::invalid_argument(format!(
                    "duplicate label '{name}'"
                )));
            }
        }
        Ok(LabelSet { names, index })
    }

    /// Index of a label.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Check if the label is retained.
    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Label names in index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no labels.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Consume the set, returning the ordered names.
    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// Result of applying a [`LabelFilter`].
#[derive(Debug, Clone)]
pub struct LabelFilterOutcome {
    /// Retained labels, in input order.
    pub labels: LabelSet,
    /// How many labels were removed.
    pub removed: usize,
    /// Minimum email count a label needed to survive.
    pub cutoff: usize,
    /// Emails per observed label.
    pub counts: AHashMap<String, usize>,
}

impl LabelFilterOutcome {
    /// Emails per retained label, in index order.
    pub fn retained_counts(&self) -> Vec<(String, usize)> {
        self.labels
            .names()
            .iter()
            .map(|label| (label.clone(), self.counts.get(label).copied().unwrap_or(0)))
            .collect()
    }
}

/// Drops labels whose email count is below a fraction of the corpus.
#[derive(Debug, Clone, Copy)]
pub struct LabelFilter {
    cutoff_fraction: f64,
}

impl LabelFilter {
    /// Create a filter. The fraction must lie in `[0, 1]`.
    pub fn new(cutoff_fraction: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&cutoff_fraction) {
            return Err(MailclassError::invalid_argument(format!(
                "label cutoff fraction must be in [0, 1], got {cutoff_fraction}"
            )));
        }
        Ok(LabelFilter { cutoff_fraction })
    }

    /// The configured fraction.
    pub fn cutoff_fraction(&self) -> f64 {
        self.cutoff_fraction
    }

    /// Count emails per label and keep labels with at least
    /// `floor(len(emails) * fraction)` emails.
    ///
    /// Every email label must appear in `observed`; an unknown label is a
    /// [`MailclassError::LabelLookup`].
    pub fn apply(&self, emails: &[EmailRecord], observed: &[String]) -> Result<LabelFilterOutcome> {
        let mut counts: AHashMap<String, usize> =
            observed.iter().map(|label| (label.clone(), 0)).collect();
        for email in emails {
            let count = counts.get_mut(&email.label).ok_or_else(|| {
                MailclassError::label_lookup(format!(
                    "email label '{}' missing from observed labels",
                    email.label
                ))
            })?;
            *count += 1;
        }

        let cutoff = (emails.len() as f64 * self.cutoff_fraction).floor() as usize;
        let mut retained = Vec::with_capacity(observed.len());
        let mut removed = 0;
        for label in observed {
            if counts[label] < cutoff {
                removed += 1;
            } else {
                retained.push(label.clone());
            }
        }

        info!("Found {removed} labels below count threshold of {cutoff}");
        let labels = LabelSet::new(retained)?;

        let outcome = LabelFilterOutcome {
            labels,
            removed,
            cutoff,
            counts,
        };
        info!("Label email count breakdown:");
        let mut total = 0;
        for (label, count) in outcome.retained_counts() {
            total += count;
            info!("\t{label}:{count}");
        }
        info!("Total emails: {total}");

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emails_with_counts(counts: &[(&str, usize)]) -> (Vec<EmailRecord>, Vec<String>) {
        let mut emails = Vec::new();
        for (label, count) in counts {
            for i in 0..*count {
                emails.push(EmailRecord::new("s", None, "d", format!("body {i}"), *label));
            }
        }
        let labels = counts.iter().map(|(l, _)| l.to_string()).collect();
        (emails, labels)
    }

    #[test]
    fn test_removes_rare_label() {
        let (emails, labels) = emails_with_counts(&[("big", 15), ("mid", 4), ("tiny", 1)]);
        let outcome = LabelFilter::new(0.1).unwrap().apply(&emails, &labels).unwrap();

        assert_eq!(outcome.cutoff, 2);
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.labels.names(), &["big", "mid"]);
        assert_eq!(outcome.labels.index_of("mid"), Some(1));
        assert!(!outcome.labels.contains("tiny"));
        assert_eq!(
            outcome.retained_counts(),
            vec![("big".to_string(), 15), ("mid".to_string(), 4)]
        );
    }

    #[test]
    fn test_count_equal_to_cutoff_is_kept() {
        let (emails, labels) = emails_with_counts(&[("a", 8), ("b", 2)]);
        let outcome = LabelFilter::new(0.2).unwrap().apply(&emails, &labels).unwrap();
        assert_eq!(outcome.cutoff, 2);
        assert_eq!(outcome.labels.len(), 2);
    }

    #[test]
    fn test_zero_fraction_keeps_everything() {
        let (emails, labels) = emails_with_counts(&[("a", 100), ("b", 1)]);
        let outcome = LabelFilter::new(0.0).unwrap().apply(&emails, &labels).unwrap();
        assert_eq!(outcome.removed, 0);
        assert_eq!(outcome.labels.names(), &["a", "b"]);
    }

    #[test]
    fn test_retained_labels_meet_cutoff() {
        let (emails, labels) =
            emails_with_counts(&[("a", 3), ("b", 7), ("c", 1), ("d", 12), ("e", 5)]);
        for fraction in [0.0, 0.05, 0.1, 0.2, 0.35, 0.5, 1.0] {
            let outcome = LabelFilter::new(fraction)
                .unwrap()
                .apply(&emails, &labels)
                .unwrap();
            let cutoff = (emails.len() as f64 * fraction).floor() as usize;
            for label in outcome.labels.names() {
                assert!(outcome.counts[label] >= cutoff);
            }
            assert_eq!(outcome.labels.len() + outcome.removed, labels.len());
        }
    }

    #[test]
    fn test_unknown_label_fails() {
        let (emails, _) = emails_with_counts(&[("a", 2), ("b", 2)]);
        let result = LabelFilter::new(0.1)
            .unwrap()
            .apply(&emails, &["a".to_string()]);
        assert!(matches!(result, Err(MailclassError::LabelLookup(_))));
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(LabelFilter::new(-0.1).is_err());
        assert!(LabelFilter::new(1.5).is_err());
        assert!(LabelFilter::new(f64::NAN).is_err());
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let result = LabelSet::new(vec!["a".to_string(), "a".to_string()]);
        assert!(matches!(result, Err(MailclassError::InvalidArgument(_))));
    }
}
