//! Case folding.

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::error::Result;

/// Lowercases every token so that `Alice` in a sender and `alice` in a body
/// share one vocabulary entry.
///
/// ```
/// use mailclass::analysis::token::Token;
/// use mailclass::analysis::token_filter::{Filter, LowercaseFilter};
///
/// let stream = Box::new(vec![Token::new("Invoice", 0)].into_iter());
/// let folded: Vec<_> = LowercaseFilter::new().filter(stream).unwrap().collect();
/// assert_eq!(folded[0].text, "invoice");
/// ```
#[derive(Clone, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl Filter for LowercaseFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        Ok(Box::new(tokens.map(|token| {
            // Most email words are already lowercase.
            if token.text.chars().any(char::is_uppercase) {
                let lowered = token.text.to_lowercase();
                token.with_text(lowered)
            } else {
                token
            }
        })))
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;

    #[test]
    fn test_folds_unicode_and_keeps_positions() {
        let tokens = vec![
            Token::new("RE", 0),
            Token::new("Réunion", 1),
            Token::new("ÉCOLE", 2),
        ];

        let folded: Vec<Token> = LowercaseFilter::new()
            .filter(Box::new(tokens.into_iter()))
            .unwrap()
            .collect();

        let texts: Vec<&str> = folded.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["re", "réunion", "école"]);
        assert_eq!(folded[2].position, 2);
    }
}
