//! Text analysis for email corpora.
//!
//! Emails are turned into word tokens by an [`Analyzer`]: a tokenizer that
//! splits on whitespace and punctuation, followed by token filters. The
//! vocabulary builder and the feature encoder both consume the same analyzer
//! so that a word is counted and encoded identically.

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

// Re-export commonly used types
pub use analyzer::*;
pub use token::*;
pub use token_filter::*;
pub use tokenizer::*;
