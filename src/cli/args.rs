//! Command line argument parsing for the mailclass CLI using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::dataset::MatrixMode;

/// mailclass - email dataset preparation and classifier evaluation
#[derive(Parser, Debug, Clone)]
#[command(name = "mailclass")]
#[command(about = "Build email classification datasets and evaluate classifiers on them")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct MailclassArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "CONFIG_FILE", env = "MAILCLASS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl MailclassArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show label, sender and domain statistics of an email collection
    Stats(StatsArgs),

    /// Build (or load from cache) a matrix dataset
    Features(FeaturesArgs),

    /// Build (or load from cache) a sequence dataset
    Sequences(SequencesArgs),

    /// Partition a dataset and evaluate a classifier on it
    Train(TrainArgs),
}

/// Where emails come from and where artifacts go.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// JSON-lines email file, or a directory of `*.jsonl` files
    #[arg(value_name = "EMAILS")]
    pub input: PathBuf,

    /// Directory for cache artifacts and the parsed-email snapshot
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// File name prefix of cache artifacts
    #[arg(long)]
    pub prefix: Option<String>,

    /// Extra cache key component
    #[arg(long)]
    pub variant: Option<String>,

    /// Vocabulary size
    #[arg(short = 'n', long)]
    pub nb_words: Option<usize>,

    /// Drop labels with fewer than this fraction of all emails
    #[arg(long)]
    pub label_cutoff: Option<f64>,

    /// Discard the cached artifact and snapshot before building
    #[arg(long)]
    pub rebuild: bool,
}

/// Arguments for email statistics
#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// JSON-lines email file, or a directory of `*.jsonl` files
    #[arg(value_name = "EMAILS")]
    pub input: PathBuf,

    /// Number of senders and domains to list
    #[arg(short, long, default_value = "10")]
    pub top: usize,
}

/// Arguments for matrix datasets
#[derive(Args, Debug, Clone)]
pub struct FeaturesArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Matrix cell encoding
    #[arg(short, long)]
    pub mode: Option<MatrixMode>,
}

/// Arguments for sequence datasets
#[derive(Args, Debug, Clone)]
pub struct SequencesArgs {
    #[command(flatten)]
    pub data: DataArgs,
}

/// Arguments for training
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Classifier to evaluate
    #[arg(long, default_value = "mlp")]
    pub model: ModelKind,

    /// Matrix cell encoding (mlp only)
    #[arg(short, long)]
    pub mode: Option<MatrixMode>,

    /// Fraction of examples held out for testing
    #[arg(long)]
    pub test_split: Option<f64>,

    /// Seed for partitioning and training
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of training epochs
    #[arg(short, long)]
    pub epochs: Option<usize>,

    /// Write per-epoch metrics to this JSON file
    #[arg(long, value_name = "FILE")]
    pub history: Option<PathBuf>,

    /// Include per-example test predictions in the output
    #[arg(long)]
    pub predictions: bool,
}

/// Classifier choices for `train`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Multilayer perceptron on matrix features
    Mlp,
    /// Sequence network on padded index sequences
    Sequence,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity() {
        let args = MailclassArgs::parse_from(["mailclass", "-vv", "stats", "emails.jsonl"]);
        assert_eq!(args.verbosity(), 2);

        let args = MailclassArgs::parse_from(["mailclass", "-q", "-vvv", "stats", "emails.jsonl"]);
        assert_eq!(args.verbosity(), 0);

        let args = MailclassArgs::parse_from(["mailclass", "stats", "emails.jsonl"]);
        assert_eq!(args.verbosity(), 1);
    }

    #[test]
    fn test_train_args() {
        let args = MailclassArgs::parse_from([
            "mailclass",
            "-f",
            "json",
            "train",
            "mail/",
            "--model",
            "sequence",
            "--nb-words",
            "500",
            "--seed",
            "3",
        ]);
        assert_eq!(args.output_format, OutputFormat::Json);
        let Command::Train(train) = args.command else {
            panic!("expected train command");
        };
        assert_eq!(train.model, ModelKind::Sequence);
        assert_eq!(train.data.nb_words, Some(500));
        assert_eq!(train.seed, Some(3));
        assert_eq!(train.data.input, PathBuf::from("mail/"));
    }

    #[test]
    fn test_features_mode() {
        let args = MailclassArgs::parse_from(["mailclass", "features", "e.jsonl", "-m", "tfidf"]);
        let Command::Features(features) = args.command else {
            panic!("expected features command");
        };
        assert_eq!(features.mode, Some(MatrixMode::Tfidf));
    }
}
