//! Tokenizer - turns transcribed text into tokens
//!
//! Specialized processors are tried in registration order at every position;
//! the first that accepts contributes a token. Anything no processor claims
//! becomes a word token bounded by the next space.

use std::sync::Arc;

use crate::token::Token;

/// Plugin point: recognizes a typed token at the head of the remaining text
pub trait SpecializedTokenProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the token and how many bytes of `remaining` it consumed
    fn try_process(&self, remaining: &str) -> Option<(Token, usize)>;
}

/// Extent of the next whitespace-delimited word
fn word_len(text: &str) -> usize {
    text.find(char::is_whitespace).unwrap_or(text.len())
}

/// Digits up to the next space become a number token
#[derive(Debug, Default)]
pub struct NumberProcessor;

impl SpecializedTokenProcessor for NumberProcessor {
    fn name(&self) -> &str {
        "number"
    }

    fn try_process(&self, remaining: &str) -> Option<(Token, usize)> {
        let len = word_len(remaining);
        let word = &remaining[..len];
        if word.is_empty() || !word.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // Overflowing digit runs stay words
        let value = word.parse::<i64>().ok()?;
        Some((Token::Number(value), len))
    }
}

/// Drives the registered processors over raw text
#[derive(Clone)]
pub struct Tokenizer {
    processors: Vec<Arc<dyn SpecializedTokenProcessor>>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new().with_processor(Arc::new(NumberProcessor))
    }
}

impl Tokenizer {
    /// Tokenizer with no specialized processors; everything becomes a word
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Append a processor; earlier registrations are asked first
    pub fn with_processor(mut self, processor: Arc<dyn SpecializedTokenProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    #[hotpath::measure]
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut rest = text.trim_start();

        while !rest.is_empty() {
            let claimed = self.processors.iter().find_map(|p| {
                p.try_process(rest)
                    // A processor must make progress and stay on a char boundary
                    .filter(|(_, used)| {
                        *used > 0 && *used <= rest.len() && rest.is_char_boundary(*used)
                    })
            });

            let used = match claimed {
                Some((token, used)) => {
                    tokens.push(token);
                    used
                }
                None => {
                    let len = word_len(rest);
                    tokens.push(Token::Word(rest[..len].to_string()));
                    len
                }
            };

            rest = rest[used..].trim_start();
        }

        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Greedy;

    impl SpecializedTokenProcessor for Greedy {
        fn name(&self) -> &str {
            "greedy"
        }

        fn try_process(&self, remaining: &str) -> Option<(Token, usize)> {
            remaining
                .starts_with("new york")
                .then(|| (Token::word("new york"), "new york".len()))
        }
    }

    struct Never;

    impl SpecializedTokenProcessor for Never {
        fn name(&self) -> &str {
            "never"
        }

        fn try_process(&self, _remaining: &str) -> Option<(Token, usize)> {
            Some((Token::Empty, 0))
        }
    }

    #[test]
    fn test_digits_become_number() {
        let tokens = Tokenizer::default().tokenize("50");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].as_int().unwrap(), 50);
    }

    #[test]
    fn test_spelled_number_stays_word() {
        let tokens = Tokenizer::default().tokenize("fifty");
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0], Token::Word(_)));
        assert!(tokens[0].matches(&Token::word("FIFTY")));
    }

    #[test]
    fn test_mixed_sentence() {
        let tokens = Tokenizer::default().tokenize("  set volume 50   please ");
        assert_eq!(
            tokens,
            vec![
                Token::word("set"),
                Token::word("volume"),
                Token::Number(50),
                Token::word("please"),
            ]
        );
    }

    #[test]
    fn test_partial_digits_stay_word() {
        let tokens = Tokenizer::default().tokenize("50th 99999999999999999999");
        assert!(matches!(tokens[0], Token::Word(_)));
        assert!(matches!(tokens[1], Token::Word(_)));
    }

    #[test]
    fn test_registration_order_wins() {
        let tokenizer = Tokenizer::new()
            .with_processor(Arc::new(Greedy))
            .with_processor(Arc::new(NumberProcessor));
        let tokens = tokenizer.tokenize("new york 7");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].as_string().unwrap(), "new york");
        assert_eq!(tokenizer.processor_names(), vec!["greedy", "number"]);
    }

    #[test]
    fn test_zero_length_claims_are_ignored() {
        let tokenizer = Tokenizer::new().with_processor(Arc::new(Never));
        let tokens = tokenizer.tokenize("go home");
        assert_eq!(tokens, vec![Token::word("go"), Token::word("home")]);
    }

    #[test]
    fn test_empty_input() {
        assert!(Tokenizer::default().tokenize("   ").is_empty());
    }
}
