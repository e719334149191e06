//! Tokenizers split raw text into tokens.

use crate::analysis::token::TokenStream;
use crate::error::Result;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<TokenStream>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

pub mod regex;

pub use self::regex::{PatternRole, RegexTokenizer};
