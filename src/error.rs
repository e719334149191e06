//! Error types for the mailclass library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`MailclassError`] enum. Errors propagate to the immediate caller; nothing
//! in the pipeline retries or recovers partial results.
//!
//! # Examples
//!
//! ```
//! use mailclass::error::{MailclassError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(MailclassError::invalid_argument("test split must be in [0, 1]"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for mailclass operations.
#[derive(Error, Debug)]
pub enum MailclassError {
    /// I/O errors (missing cache files, unreadable email exports, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested configuration cannot be satisfied by the data,
    /// e.g. a vocabulary larger than the corpus.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A label was seen on an email but is missing from the label counts.
    #[error("Label lookup error: {0}")]
    LabelLookup(String),

    /// A cache artifact is malformed, truncated, or belongs to another key.
    #[error("Cache format error: {0}")]
    CacheFormat(String),

    /// Lengths or widths that must agree do not.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Analysis-related errors (tokenization, filtering, etc.)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Model training or evaluation failed.
    #[error("Model error: {0}")]
    Model(String),

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Errors raised by external backends
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with MailclassError.
pub type Result<T> = std::result::Result<T, MailclassError>;

impl MailclassError {
    /// Create a new configuration error.
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        MailclassError::Configuration(msg.into())
    }

    /// Create a new label lookup error.
    pub fn label_lookup<S: Into<String>>(msg: S) -> Self {
        MailclassError::LabelLookup(msg.into())
    }

    /// Create a new cache format error.
    pub fn cache_format<S: Into<String>>(msg: S) -> Self {
        MailclassError::CacheFormat(msg.into())
    }

    /// Create a new shape mismatch error.
    pub fn shape_mismatch<S: Into<String>>(msg: S) -> Self {
        MailclassError::ShapeMismatch(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        MailclassError::InvalidArgument(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        MailclassError::Analysis(msg.into())
    }

    /// Create a new model error.
    pub fn model<S: Into<String>>(msg: S) -> Self {
        MailclassError::Model(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        MailclassError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = MailclassError::configuration("nb_words too large");
        assert_eq!(error.to_string(), "Configuration error: nb_words too large");

        let error = MailclassError::label_lookup("spam");
        assert_eq!(error.to_string(), "Label lookup error: spam");

        let error = MailclassError::cache_format("line 3: missing delimiter");
        assert_eq!(
            error.to_string(),
            "Cache format error: line 3: missing delimiter"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = MailclassError::from(io_error);

        match error {
            MailclassError::Io(_) => {} // Expected
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_anyhow_conversion() {
        let error = MailclassError::from(anyhow::anyhow!("backend exploded"));
        assert!(matches!(error, MailclassError::Anyhow(_)));
        assert!(error.to_string().contains("backend exploded"));
    }
}
