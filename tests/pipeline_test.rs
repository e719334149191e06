use std::fs;
use std::path::Path;
use std::sync::Arc;

use mailclass::analysis::analyzer::{Analyzer, StandardAnalyzer};
use mailclass::cache::{CacheKey, DatasetCache};
use mailclass::config::DatasetConfig;
use mailclass::dataset::{
    DatasetBuilder, FeatureEncoder, FeatureKind, Features, MatrixMode, VocabularyBuilder,
};
use mailclass::email::{EmailRecord, EmailSource, JsonlEmailSource, load_or_parse_emails};
use mailclass::error::{MailclassError, Result};
use mailclass::model::{HistoryRecorder, MlpConfig, evaluate_mlp_model};
use mailclass::partition::Partitioner;
use tempfile::TempDir;

fn email(label: &str, content: &str) -> EmailRecord {
    EmailRecord::new("sender", None, "example.org", content, label)
}

fn write_jsonl(path: &Path, emails: &[EmailRecord]) {
    let lines: Vec<String> = emails
        .iter()
        .map(|e| serde_json::to_string(e).unwrap())
        .collect();
    fs::write(path, lines.join("\n") + "\n").unwrap();
}

/// 15 work, 4 family and 1 spam email.
fn skewed_emails() -> Vec<EmailRecord> {
    let mut emails = Vec::new();
    for i in 0..15 {
        emails.push(email("work", &format!(" budget meeting report{}", i % 3)));
    }
    for _ in 0..4 {
        emails.push(email("family", " dinner tonight"));
    }
    emails.push(email("spam", " winner prize"));
    emails
}

#[test]
fn test_rare_label_is_filtered() -> Result<()> {
    let config = DatasetConfig {
        nb_words: 5,
        label_cutoff: 0.1,
        ..Default::default()
    };
    let dataset = DatasetBuilder::new(config)?.build(
        &skewed_emails(),
        FeatureKind::Matrix(MatrixMode::Binary),
    )?;

    assert_eq!(dataset.len(), 19);
    assert_eq!(dataset.label_names, vec!["work", "family"]);
    assert_eq!(dataset.labels.iter().filter(|&&l| l == 1).count(), 4);
    assert!(!dataset.feature_names.iter().any(|w| w == "winner"));
    Ok(())
}

#[test]
fn test_count_matrix_over_small_corpus() -> Result<()> {
    let analyzer: Arc<dyn Analyzer> = Arc::new(StandardAnalyzer::new()?);
    let texts = vec!["a b c".to_string(), "a a b".to_string()];
    let vocabulary = VocabularyBuilder::new(3, Arc::clone(&analyzer))?.fit(&texts)?;
    assert_eq!(vocabulary.words(), ["a", "b", "c"]);

    let documents = texts
        .iter()
        .map(|t| analyzer.words(t))
        .collect::<Result<Vec<_>>>()?;
    let matrix = FeatureEncoder::new(&vocabulary).encode_matrix(&documents, MatrixMode::Count)?;
    assert_eq!(matrix.to_rows(), vec![vec![1.0, 1.0, 1.0], vec![2.0, 1.0, 0.0]]);
    Ok(())
}

#[test]
fn test_vocabulary_larger_than_corpus_fails() -> Result<()> {
    let config = DatasetConfig {
        nb_words: 500,
        ..Default::default()
    };
    let err = DatasetBuilder::new(config)?
        .build(&skewed_emails(), FeatureKind::Sequences)
        .unwrap_err();
    assert!(matches!(err, MailclassError::Configuration(_)));
    Ok(())
}

#[test]
fn test_cached_pipeline_reproduces_dataset() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("emails.jsonl");
    write_jsonl(&input, &skewed_emails());
    let cache_dir = dir.path().join("cache");

    let config = DatasetConfig {
        nb_words: 6,
        label_cutoff: 0.1,
        seed: Some(11),
        ..Default::default()
    };
    let source = JsonlEmailSource::new(&input);
    let cache = DatasetCache::new(&cache_dir);

    for kind in [FeatureKind::Matrix(MatrixMode::Tfidf), FeatureKind::Sequences] {
        let key = CacheKey::new("inbox", config.nb_words, kind)?;
        let built = cache.load_or_build(&key, || {
            let emails = load_or_parse_emails(&source, &cache_dir.join("emails.json"))?;
            DatasetBuilder::new(config.clone())?.build(&emails, kind)
        })?;
        assert!(cache.contains(&key));

        let loaded = cache.load_or_build(&key, || panic!("cache should be hit"))?;
        assert_eq!(loaded, built);
    }
    assert_eq!(source.parse_emails()?.len(), 20);
    Ok(())
}

#[test]
fn test_cutoff_and_input_select_distinct_artifacts() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("emails.jsonl");
    write_jsonl(&input, &skewed_emails());
    let cache = DatasetCache::new(dir.path().join("cache"));
    let kind = FeatureKind::Matrix(MatrixMode::Binary);

    let build_with = |source: &JsonlEmailSource, label_cutoff: f64| -> Result<_> {
        let config = DatasetConfig {
            nb_words: 5,
            label_cutoff,
            ..Default::default()
        };
        let key = CacheKey::new("inbox", config.nb_words, kind)?
            .with_label_cutoff(label_cutoff)?
            .with_source(source.fingerprint()?);
        let dataset = cache.load_or_build(&key, || {
            DatasetBuilder::new(config.clone())?.build(&source.parse_emails()?, kind)
        })?;
        Ok((key, dataset))
    };

    let source = JsonlEmailSource::new(&input);
    let (all_key, all) = build_with(&source, 0.0)?;
    let (filtered_key, filtered) = build_with(&source, 0.1)?;
    assert_ne!(all_key, filtered_key);
    assert_eq!(all.label_names, vec!["work", "family", "spam"]);
    assert_eq!(all.len(), 20);
    assert_eq!(filtered.label_names, vec!["work", "family"]);
    assert_eq!(filtered.len(), 19);

    // Same cutoff, new mailbox contents: a fresh build, not the old artifact.
    let mut emails = skewed_emails();
    emails.push(email("spam", " winner prize"));
    write_jsonl(&input, &emails);
    let (changed_key, changed) = build_with(&source, 0.0)?;
    assert_ne!(changed_key, all_key);
    assert_eq!(changed.len(), 21);
    assert!(cache.contains(&all_key));
    Ok(())
}

#[test]
fn test_partition_and_evaluate() -> Result<()> {
    let mut emails = Vec::new();
    for i in 0..30 {
        emails.push(email("work", &format!(" budget meeting quarterly{}", i % 2)));
        emails.push(email("family", &format!(" dinner weekend picnic{}", i % 2)));
    }
    let config = DatasetConfig {
        nb_words: 10,
        ..Default::default()
    };
    let dataset = DatasetBuilder::new(config)?.build(&emails, FeatureKind::Matrix(MatrixMode::Binary))?;

    let parts = Partitioner::with_seed(0.2, 5)?.split_dataset(&dataset)?;
    assert_eq!(parts.test.len(), 12);
    assert_eq!(parts.train.len(), 48);
    assert!(matches!(parts.train.features, Features::Matrix(_)));

    let mlp = MlpConfig {
        num_hidden: 16,
        dropout: 0.0,
        epochs: 30,
        learning_rate: 0.05,
        seed: Some(3),
        ..Default::default()
    };
    let mut recorder = HistoryRecorder::new();
    let report = evaluate_mlp_model(&parts, dataset.num_labels(), &mlp, Some(&mut recorder))?;

    assert_eq!(report.history.len(), 30);
    assert_eq!(recorder.history().len(), 30);
    assert_eq!(report.predictions.len(), 12);
    assert_eq!(report.accuracy, 1.0);
    Ok(())
}
