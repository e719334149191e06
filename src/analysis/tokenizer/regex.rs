//! Regex-based tokenizer.
//!
//! A pattern either describes the words themselves ([`RegexTokenizer::new`])
//! or the separators between them ([`RegexTokenizer::email`]).

use std::sync::Arc;

use regex::Regex;

use super::Tokenizer;
use crate::analysis::token::{Token, TokenStream};
use crate::error::{MailclassError, Result};

/// Runs of whitespace and ASCII punctuation, apostrophe excluded so that
/// contractions stay whole.
pub const EMAIL_SEPARATOR_PATTERN: &str = r##"[\s!"#$%&()*+,\-./:;<=>?@\[\\\]\^_`{|}~]+"##;

/// What the pattern of a [`RegexTokenizer`] matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternRole {
    /// Matches are tokens.
    Words,
    /// Matches separate tokens.
    Separators,
}

/// Splits text with a compiled regular expression.
#[derive(Clone, Debug)]
pub struct RegexTokenizer {
    pattern: Arc<Regex>,
    role: PatternRole,
}

impl RegexTokenizer {
    /// Tokens are runs of word characters (`\w+`).
    pub fn new() -> Result<Self> {
        Self::with_pattern(r"\w+", PatternRole::Words)
    }

    /// Tokens are the text between [`EMAIL_SEPARATOR_PATTERN`] matches.
    pub fn email() -> Result<Self> {
        Self::with_pattern(EMAIL_SEPARATOR_PATTERN, PatternRole::Separators)
    }

    /// Compile `pattern` for the given role.
    pub fn with_pattern(pattern: &str, role: PatternRole) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| MailclassError::analysis(format!("Invalid regex pattern: {e}")))?;
        Ok(RegexTokenizer {
            pattern: Arc::new(regex),
            role,
        })
    }

    /// Source of the compiled pattern.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Role of the pattern.
    pub fn role(&self) -> PatternRole {
        self.role
    }

    /// Byte ranges of the tokens in `text`.
    fn spans(&self, text: &str) -> Vec<(usize, usize)> {
        match self.role {
            PatternRole::Words => self
                .pattern
                .find_iter(text)
                .map(|m| (m.start(), m.end()))
                .collect(),
            PatternRole::Separators => {
                let mut spans = Vec::new();
                let mut start = 0;
                for m in self.pattern.find_iter(text) {
                    if m.start() > start {
                        spans.push((start, m.start()));
                    }
                    start = m.end();
                }
                if start < text.len() {
                    spans.push((start, text.len()));
                }
                spans
            }
        }
    }
}

impl Tokenizer for RegexTokenizer {
    fn tokenize(&self, text: &str) -> Result<TokenStream> {
        let tokens: Vec<Token> = self
            .spans(text)
            .into_iter()
            .enumerate()
            .map(|(position, (start, end))| Token::with_offsets(&text[start..end], position, start, end))
            .collect();
        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "regex"
    }
}
