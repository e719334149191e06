//! The analyzer every dataset is built with.

use std::sync::Arc;

use crate::analysis::analyzer::analyzer::Analyzer;
use crate::analysis::analyzer::pipeline::PipelineAnalyzer;
use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::lowercase::LowercaseFilter;
use crate::analysis::tokenizer::regex::RegexTokenizer;
use crate::error::Result;

/// Lowercased words between runs of whitespace and punctuation.
///
/// ```
/// use mailclass::analysis::analyzer::{Analyzer, StandardAnalyzer};
///
/// let analyzer = StandardAnalyzer::new().unwrap();
/// assert_eq!(analyzer.words("Lunch @ noon?").unwrap(), vec!["lunch", "noon"]);
/// ```
#[derive(Debug, Clone)]
pub struct StandardAnalyzer {
    inner: PipelineAnalyzer,
}

impl StandardAnalyzer {
    pub fn new() -> Result<Self> {
        let inner = PipelineAnalyzer::new(Arc::new(RegexTokenizer::email()?))
            .add_filter(Arc::new(LowercaseFilter::new()))
            .with_name("standard");
        Ok(StandardAnalyzer { inner })
    }

    /// The underlying pipeline.
    pub fn inner(&self) -> &PipelineAnalyzer {
        &self.inner
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        self.inner.analyze(text)
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}
