//! Token model - the alphabet the trie matches against
//!
//! Tokens are immutable values produced by the tokenizer. Built-in kinds cover
//! words and integers; plugins add their own kinds through [`CustomToken`].

use std::fmt;
use std::sync::Arc;

use crate::error::{EngineError, Result};

/// Behaviour a plugin-defined token kind must provide
pub trait CustomToken: fmt::Debug + Send + Sync {
    /// Short kind name, used in error messages and debug output
    fn kind(&self) -> &'static str;

    /// String projection, `None` if this kind has no string form
    fn as_string(&self) -> Option<&str> {
        None
    }

    /// Integer projection, `None` if this kind has no integer form
    fn as_int(&self) -> Option<i64> {
        None
    }

    /// Equality against any other token
    fn matches(&self, other: &Token) -> bool;
}

/// A single transcribed unit
#[derive(Debug, Clone)]
pub enum Token {
    Empty,
    Word(String),
    Number(i64),
    Custom(Arc<dyn CustomToken>),
}

impl Token {
    pub fn word(text: impl Into<String>) -> Self {
        Token::Word(text.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Token::Empty => "empty",
            Token::Word(_) => "word",
            Token::Number(_) => "number",
            Token::Custom(custom) => custom.kind(),
        }
    }

    /// String projection. Numbers project to their decimal text.
    pub fn as_string(&self) -> Result<String> {
        match self {
            Token::Word(w) => Ok(w.clone()),
            Token::Number(n) => Ok(n.to_string()),
            Token::Custom(custom) => custom
                .as_string()
                .map(str::to_string)
                .ok_or_else(|| self.mismatch("string")),
            Token::Empty => Err(self.mismatch("string")),
        }
    }

    /// Integer projection. Only numeric tokens (and custom kinds that opt in) succeed.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Token::Number(n) => Ok(*n),
            Token::Custom(custom) => custom.as_int().ok_or_else(|| self.mismatch("int")),
            Token::Word(_) | Token::Empty => Err(self.mismatch("int")),
        }
    }

    /// Token equality; words compare case-insensitively
    pub fn matches(&self, other: &Token) -> bool {
        match (self, other) {
            (Token::Empty, Token::Empty) => true,
            (Token::Word(a), Token::Word(b)) => eq_ignore_case(a, b),
            (Token::Number(a), Token::Number(b)) => a == b,
            (Token::Custom(custom), _) => custom.matches(other),
            (_, Token::Custom(custom)) => custom.matches(self),
            _ => false,
        }
    }

    /// True if this is a word token equal to `text` ignoring case
    pub fn is_word(&self, text: &str) -> bool {
        match self {
            Token::Word(w) => eq_ignore_case(w, text),
            _ => false,
        }
    }

    fn mismatch(&self, expected: &'static str) -> EngineError {
        EngineError::TokenTypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Empty => Ok(()),
            Token::Word(w) => write!(f, "{}", w),
            Token::Number(n) => write!(f, "{}", n),
            Token::Custom(custom) => match custom.as_string() {
                Some(s) => write!(f, "{}", s),
                None => write!(f, "<{}>", custom.kind()),
            },
        }
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// Join tokens back into plain text, space separated
pub fn join(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ordinal(i64);

    impl CustomToken for Ordinal {
        fn kind(&self) -> &'static str {
            "ordinal"
        }

        fn as_int(&self) -> Option<i64> {
            Some(self.0)
        }

        fn matches(&self, other: &Token) -> bool {
            other.as_int().map(|n| n == self.0).unwrap_or(false)
        }
    }

    #[test]
    fn test_word_matches_ignore_case() {
        assert!(Token::word("fifty").matches(&Token::word("FIFTY")));
        assert!(Token::word("Éclair").matches(&Token::word("éclair")));
        assert!(!Token::word("fifty").matches(&Token::Number(50)));
    }

    #[test]
    fn test_projections() {
        assert_eq!(Token::Number(50).as_int().unwrap(), 50);
        assert_eq!(Token::Number(50).as_string().unwrap(), "50");
        assert_eq!(Token::word("go").as_string().unwrap(), "go");

        let err = Token::word("go").as_int().unwrap_err();
        assert!(matches!(
            err,
            EngineError::TokenTypeMismatch {
                expected: "int",
                found: "word"
            }
        ));
        assert!(Token::Empty.as_string().is_err());
    }

    #[test]
    fn test_custom_kind() {
        let third = Token::Custom(Arc::new(Ordinal(3)));
        assert_eq!(third.kind(), "ordinal");
        assert_eq!(third.as_int().unwrap(), 3);
        assert!(third.as_string().is_err());
        assert!(third.matches(&Token::Number(3)));
        assert!(Token::Number(3).matches(&third));
        assert_eq!(third.to_string(), "<ordinal>");
    }

    #[test]
    fn test_join() {
        let tokens = vec![Token::word("set"), Token::Empty, Token::Number(5)];
        assert_eq!(join(&tokens), "set 5");
    }
}
