//! # mailclass
//!
//! Email dataset construction and label classification for Rust.
//!
//! ## Features
//!
//! - JSON-lines email sources with a parsed-email snapshot
//! - Frequency-ranked vocabularies and rare-label filtering
//! - Binary, count, frequency and TF-IDF matrices or index sequences
//! - Checksummed on-disk dataset cache
//! - Seeded train/test partitioning with one-hot labels
//! - Perceptron and sequence classifier evaluation

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod email;
pub mod error;
pub mod model;
pub mod partition;

pub mod prelude {
    pub use crate::cache::{CacheKey, DatasetCache};
    pub use crate::config::MailclassConfig;
    pub use crate::dataset::{DatasetBuilder, EncodedDataset, FeatureKind, Features, MatrixMode};
    pub use crate::email::{EmailRecord, EmailSource, JsonlEmailSource};
    pub use crate::error::{MailclassError, Result};
    pub use crate::partition::Partitioner;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
