//! Tokens and token streams.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A word cut out of an email text.
///
/// ```
/// use mailclass::analysis::token::Token;
///
/// let token = Token::with_offsets("lunch", 3, 12, 17);
/// assert_eq!(token.to_string(), "lunch");
/// assert_eq!(token.end_offset - token.start_offset, token.text.len());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Word text after filtering.
    pub text: String,
    /// 0-based index in the stream.
    pub position: usize,
    /// Byte range in the analyzed text, before any filter rewrote `text`.
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Token {
    /// Token without source offsets.
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        Self::with_offsets(text, position, 0, 0)
    }

    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
        }
    }

    /// Replace the text, keeping position and offsets.
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Tokens flowing from a tokenizer through the filters.
pub type TokenStream = Box<dyn Iterator<Item = Token>>;
