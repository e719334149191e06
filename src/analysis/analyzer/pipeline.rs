//! Analyzer assembled from one tokenizer and any number of filters.
//!
//! ```
//! use std::sync::Arc;
//!
//! use mailclass::analysis::analyzer::{Analyzer, PipelineAnalyzer};
//! use mailclass::analysis::token_filter::LowercaseFilter;
//! use mailclass::analysis::tokenizer::RegexTokenizer;
//!
//! let analyzer = PipelineAnalyzer::new(Arc::new(RegexTokenizer::email().unwrap()))
//!     .add_filter(Arc::new(LowercaseFilter::new()))
//!     .with_name("folded_email");
//!
//! assert_eq!(analyzer.words("Fwd: Team-Lunch").unwrap(), vec!["fwd", "team", "lunch"]);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::analysis::tokenizer::Tokenizer;
use crate::error::Result;

/// Tokenizer output passed through each filter in insertion order.
#[derive(Clone)]
pub struct PipelineAnalyzer {
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn Filter>>,
    name: String,
}

impl PipelineAnalyzer {
    /// Pipeline without filters, named after its tokenizer.
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        PipelineAnalyzer {
            name: format!("pipeline_{}", tokenizer.name()),
            tokenizer,
            filters: Vec::new(),
        }
    }

    /// Append a filter.
    pub fn add_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Name given by [`PipelineAnalyzer::with_name`].
    pub fn pipeline_name(&self) -> &str {
        &self.name
    }

    /// Filter names in application order.
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|filter| filter.name()).collect()
    }
}

impl Analyzer for PipelineAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.filters
            .iter()
            .try_fold(self.tokenizer.tokenize(text)?, |tokens, filter| filter.filter(tokens))
    }

    fn name(&self) -> &'static str {
        "pipeline"
    }
}

impl fmt::Debug for PipelineAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipelineAnalyzer({}: {} -> [{}])",
            self.name,
            self.tokenizer.name(),
            self.filter_names().join(", ")
        )
    }
}
