//! Command implementations for the mailclass CLI.

use std::fs;

use ahash::AHashMap;
use log::info;

use crate::analysis::analyzer::StandardAnalyzer;
use crate::cache::{CacheKey, DatasetCache};
use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::MailclassConfig;
use crate::dataset::{DatasetBuilder, EncodedDataset, FeatureKind, Features};
use crate::email::{EmailSource, EmailStats, JsonlEmailSource, load_or_parse_emails};
use crate::error::{MailclassError, Result};
use crate::model::{GruNetwork, HistoryRecorder, evaluate_mlp_model, evaluate_recurrent_model};
use crate::partition::Partitioner;

/// Execute a CLI command.
pub fn execute_command(args: MailclassArgs) -> Result<()> {
    let config = load_config(&args)?;
    match &args.command {
        Command::Stats(stats_args) => show_stats(stats_args, &args),
        Command::Features(features_args) => build_features(features_args, config, &args),
        Command::Sequences(sequences_args) => build_sequences(sequences_args, config, &args),
        Command::Train(train_args) => train_model(train_args, config, &args),
    }
}

/// Load the configuration file, or the defaults when none is given.
fn load_config(args: &MailclassArgs) -> Result<MailclassConfig> {
    match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            MailclassConfig::from_file(path)
        }
        None => Ok(MailclassConfig::default()),
    }
}

/// Apply dataset flags on top of the configuration.
fn apply_data_args(config: &mut MailclassConfig, data: &DataArgs) -> Result<()> {
    if let Some(dir) = &data.cache_dir {
        config.cache.dir = dir.clone();
    }
    if let Some(prefix) = &data.prefix {
        config.cache.prefix = prefix.clone();
    }
    if let Some(variant) = &data.variant {
        config.cache.variant = Some(variant.clone());
    }
    if let Some(nb_words) = data.nb_words {
        config.dataset.nb_words = nb_words;
    }
    if let Some(label_cutoff) = data.label_cutoff {
        config.dataset.label_cutoff = label_cutoff;
    }
    config.validate()
}

/// Load the dataset for `kind` from the cache, building it on a miss.
fn cached_dataset(
    data: &DataArgs,
    config: &MailclassConfig,
    kind: FeatureKind,
) -> Result<(EncodedDataset, String)> {
    let source = JsonlEmailSource::new(&data.input);
    let fingerprint = source.fingerprint()?;
    let snapshot = config.cache.email_snapshot_path(fingerprint);

    let mut key = CacheKey::new(config.cache.prefix.clone(), config.dataset.nb_words, kind)?
        .with_label_cutoff(config.dataset.label_cutoff)?
        .with_source(fingerprint);
    if let Some(variant) = &config.cache.variant {
        key = key.with_variant(variant.clone())?;
    }
    let cache = DatasetCache::new(&config.cache.dir);

    if data.rebuild {
        info!("Discarding cached artifact {key} and email snapshot");
        cache.remove(&key)?;
        if snapshot.is_file() {
            fs::remove_file(&snapshot)?;
        }
    }

    let dataset = cache.load_or_build(&key, || {
        let emails = load_or_parse_emails(&source, &snapshot)?;
        DatasetBuilder::new(config.dataset.clone())?.build(&emails, kind)
    })?;
    Ok((dataset, cache.data_path(&key).display().to_string()))
}

fn label_summaries(dataset: &EncodedDataset) -> Vec<LabelSummary> {
    let mut emails = vec![0usize; dataset.num_labels()];
    for &label in &dataset.labels {
        emails[label] += 1;
    }
    let mut words = vec![0usize; dataset.num_labels()];
    if let Features::Sequences(sequences) = &dataset.features {
        for (sequence, &label) in sequences.iter().zip(&dataset.labels) {
            words[label] += sequence.len();
        }
    }

    dataset
        .label_names
        .iter()
        .enumerate()
        .map(|(i, name)| LabelSummary {
            label: name.clone(),
            emails: emails[i],
            words: words[i],
        })
        .collect()
}

fn dataset_summary(dataset: &EncodedDataset, cache_file: String, encoding: &str) -> DatasetSummary {
    let mean_sequence_length = match &dataset.features {
        Features::Sequences(sequences) if !sequences.is_empty() => Some(
            sequences.iter().map(Vec::len).sum::<usize>() as f64 / sequences.len() as f64,
        ),
        _ => None,
    };
    DatasetSummary {
        cache_file,
        encoding: encoding.to_string(),
        examples: dataset.len(),
        features: dataset.feature_names.len(),
        labels: label_summaries(dataset),
        mean_sequence_length,
    }
}

/// Show email statistics.
fn show_stats(args: &StatsArgs, cli_args: &MailclassArgs) -> Result<()> {
    let source = JsonlEmailSource::new(&args.input);
    let emails = source.parse_emails()?;
    let stats = EmailStats::from_emails(&emails, &StandardAnalyzer::new()?)?;
    stats.log_word_breakdown();

    let mut label_emails: AHashMap<&str, usize> = AHashMap::new();
    for email in &emails {
        *label_emails.entry(email.label.as_str()).or_insert(0) += 1;
    }
    let labels = stats
        .labels
        .iter()
        .map(|label| LabelSummary {
            label: label.clone(),
            emails: label_emails.get(label.as_str()).copied().unwrap_or(0),
            words: stats.word_total(label),
        })
        .collect();

    let report = EmailStatsReport {
        source: source.describe(),
        total_emails: emails.len(),
        labels,
        top_senders: top_counts(&stats.sender_counts, args.top),
        top_domains: top_counts(&stats.domain_counts, args.top),
    };
    output_result("Email statistics", &report, cli_args)
}

/// Highest counts first, ties by name.
fn top_counts(counts: &AHashMap<String, usize>, limit: usize) -> Vec<NamedCount> {
    let mut entries: Vec<NamedCount> = counts
        .iter()
        .map(|(name, &count)| NamedCount {
            name: name.clone(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(limit);
    entries
}

/// Build or load a matrix dataset.
fn build_features(args: &FeaturesArgs, mut config: MailclassConfig, cli_args: &MailclassArgs) -> Result<()> {
    if let Some(mode) = args.mode {
        config.dataset.matrix_mode = mode;
    }
    apply_data_args(&mut config, &args.data)?;

    let mode = config.dataset.matrix_mode;
    let (dataset, cache_file) = cached_dataset(&args.data, &config, FeatureKind::Matrix(mode))?;
    output_result(
        "Matrix dataset ready",
        &dataset_summary(&dataset, cache_file, mode.as_str()),
        cli_args,
    )
}

/// Build or load a sequence dataset.
fn build_sequences(args: &SequencesArgs, mut config: MailclassConfig, cli_args: &MailclassArgs) -> Result<()> {
    apply_data_args(&mut config, &args.data)?;

    let (dataset, cache_file) = cached_dataset(&args.data, &config, FeatureKind::Sequences)?;
    output_result(
        "Sequence dataset ready",
        &dataset_summary(&dataset, cache_file, "sequence"),
        cli_args,
    )
}

/// Partition a dataset and evaluate a classifier.
fn train_model(args: &TrainArgs, mut config: MailclassConfig, cli_args: &MailclassArgs) -> Result<()> {
    if let Some(mode) = args.mode {
        config.dataset.matrix_mode = mode;
    }
    if let Some(test_split) = args.test_split {
        config.dataset.test_split = test_split;
    }
    if let Some(seed) = args.seed {
        config.dataset.seed = Some(seed);
        config.mlp.seed = Some(seed);
        config.recurrent.seed = Some(seed);
    }
    if let Some(epochs) = args.epochs {
        config.mlp.epochs = epochs;
        config.recurrent.epochs = epochs;
    }
    apply_data_args(&mut config, &args.data)?;

    let kind = match args.model {
        ModelKind::Mlp => FeatureKind::Matrix(config.dataset.matrix_mode),
        ModelKind::Sequence => FeatureKind::Sequences,
    };
    let (dataset, _) = cached_dataset(&args.data, &config, kind)?;

    let mut partitioner = match config.dataset.seed {
        Some(seed) => Partitioner::with_seed(config.dataset.test_split, seed)?,
        None => Partitioner::new(config.dataset.test_split)?,
    };
    let parts = partitioner.split_dataset(&dataset)?;
    let num_classes = dataset.num_labels();

    let mut recorder = HistoryRecorder::new();
    if let Some(path) = &args.history {
        recorder = recorder.save_to(path);
    }

    let report = match args.model {
        ModelKind::Mlp => evaluate_mlp_model(&parts, num_classes, &config.mlp, Some(&mut recorder))?,
        ModelKind::Sequence => {
            // Indices never exceed the vocabulary size.
            let mut recurrent = config.recurrent.clone();
            recurrent.max_features = recurrent.max_features.min(dataset.feature_names.len() + 1);
            let mut backend = GruNetwork::new(&recurrent);
            evaluate_recurrent_model(&mut backend, &parts, num_classes, &recurrent, Some(&mut recorder))?
        }
    };

    let predictions = if args.predictions {
        let names = report
            .predictions
            .iter()
            .map(|&p| {
                dataset.label_names.get(p).cloned().ok_or_else(|| {
                    MailclassError::model(format!("predicted class {p} has no label name"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Some(names)
    } else {
        None
    };

    let summary = TrainingSummary {
        model: match args.model {
            ModelKind::Mlp => "mlp".to_string(),
            ModelKind::Sequence => "sequence".to_string(),
        },
        train_examples: parts.train.len(),
        test_examples: parts.test.len(),
        num_classes,
        test_score: report.score,
        test_accuracy: report.accuracy,
        epochs: report.history,
        predictions,
    };
    output_result("Evaluation finished", &summary, cli_args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_counts_order() {
        let mut counts = AHashMap::new();
        counts.insert("b@x".to_string(), 3);
        counts.insert("a@x".to_string(), 3);
        counts.insert("c@x".to_string(), 9);
        counts.insert("d@x".to_string(), 1);

        let top = top_counts(&counts, 3);
        let names: Vec<&str> = top.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c@x", "a@x", "b@x"]);
    }

    #[test]
    fn test_label_summaries() {
        let dataset = EncodedDataset {
            features: Features::Sequences(vec![vec![1, 2], vec![3], vec![1, 1, 1]]),
            labels: vec![0, 1, 0],
            feature_names: vec!["a".into(), "b".into(), "c".into()],
            label_names: vec!["work".into(), "home".into()],
        };
        let summaries = label_summaries(&dataset);
        assert_eq!(summaries[0].emails, 2);
        assert_eq!(summaries[0].words, 5);
        assert_eq!(summaries[1].label, "home");

        let summary = dataset_summary(&dataset, "x.txt".into(), "sequence");
        assert_eq!(summary.mean_sequence_length, Some(2.0));
    }
}
