//! The analyzer seam.
//!
//! ```text
//! email text ─► Tokenizer ─► Filter ... Filter ─► words
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Turns a text into the words that vocabulary fitting and encoding see.
///
/// ```
/// use mailclass::analysis::analyzer::{Analyzer, StandardAnalyzer};
///
/// let words = StandardAnalyzer::new().unwrap().words("Hello, World").unwrap();
/// assert_eq!(words, vec!["hello", "world"]);
/// ```
pub trait Analyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Token texts in order.
    fn words(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.analyze(text)?.map(|token| token.text).collect())
    }
}
