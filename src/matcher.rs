//! Node matchers - the unit of matching logic bound to one trie node
//!
//! Each matcher inspects the head of a token window, and on success returns a
//! new accumulator plus the tokens it did not consume. Accumulators are
//! persistent: binding a capture produces a new state and leaves the old one
//! untouched, so a failed branch can never leak captures into a sibling.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::fuzzy::fuzzy_match;
use crate::token::Token;

pub const WEIGHT_WORD: u32 = 0;
pub const WEIGHT_FUZZY: u32 = 5;
pub const WEIGHT_NUMBER_CAPTURE: u32 = 10;
pub const WEIGHT_WORD_CAPTURE: u32 = 20;
pub const WEIGHT_ANY_CAPTURE: u32 = 30;

/// Identifier of one command registration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(Arc<str>);

impl CommandId {
    pub fn new(id: &str) -> Self {
        Self(Arc::from(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CommandId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A successful top-level match
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    pub id: CommandId,
    pub parameters: BTreeMap<String, Token>,
}

impl ParsedCommand {
    pub fn parameter(&self, name: &str) -> Option<&Token> {
        self.parameters.get(name)
    }
}

#[derive(Debug)]
struct Binding {
    name: Arc<str>,
    token: Token,
    prev: Option<Arc<Binding>>,
}

/// Per-traversal accumulator of captured parameters
#[derive(Debug, Clone, Default)]
pub struct MatchState {
    head: Option<Arc<Binding>>,
    depth: usize,
}

impl MatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// New state with `token` bound under `name`; `self` is unchanged
    pub fn bind(&self, name: Arc<str>, token: Token) -> Self {
        Self {
            head: Some(Arc::new(Binding {
                name,
                token,
                prev: self.head.clone(),
            })),
            depth: self.depth + 1,
        }
    }

    /// Latest binding for `name`
    pub fn get(&self, name: &str) -> Option<&Token> {
        let mut cursor = self.head.as_deref();
        while let Some(binding) = cursor {
            if &*binding.name == name {
                return Some(&binding.token);
            }
            cursor = binding.prev.as_deref();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    /// Close the accumulator into a parsed command. Later bindings shadow earlier ones.
    pub fn finish(&self, id: CommandId) -> ParsedCommand {
        let mut parameters = BTreeMap::new();
        let mut cursor = self.head.as_deref();
        while let Some(binding) = cursor {
            parameters
                .entry(binding.name.to_string())
                .or_insert_with(|| binding.token.clone());
            cursor = binding.prev.as_deref();
        }
        ParsedCommand { id, parameters }
    }
}

/// What a capture placeholder accepts
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    #[default]
    Word,
    Number,
    Any,
}

impl CaptureKind {
    pub fn accepts(self, token: &Token) -> bool {
        match self {
            CaptureKind::Word => matches!(token, Token::Word(_)),
            CaptureKind::Number => matches!(token, Token::Number(_)),
            CaptureKind::Any => !matches!(token, Token::Empty),
        }
    }

    /// More specific kinds weigh less
    pub fn weight(self) -> u32 {
        match self {
            CaptureKind::Number => WEIGHT_NUMBER_CAPTURE,
            CaptureKind::Word => WEIGHT_WORD_CAPTURE,
            CaptureKind::Any => WEIGHT_ANY_CAPTURE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CaptureKind::Word => "word",
            CaptureKind::Number => "number",
            CaptureKind::Any => "any",
        }
    }
}

impl FromStr for CaptureKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "word" => Ok(CaptureKind::Word),
            "number" | "int" => Ok(CaptureKind::Number),
            "any" => Ok(CaptureKind::Any),
            other => Err(format!("unknown capture kind '{}'", other)),
        }
    }
}

/// Plugin-supplied matching logic
pub trait CustomMatcher: fmt::Debug + Send + Sync {
    /// Structural identity used to merge equivalent trie nodes.
    /// Two matchers with equal keys must behave identically.
    fn key(&self) -> String;

    fn weight(&self) -> u32;

    fn try_match<'a>(
        &self,
        tokens: &'a [Token],
        state: &MatchState,
    ) -> Option<(MatchState, &'a [Token])>;
}

/// Matching logic of one trie node
#[derive(Debug, Clone)]
pub enum NodeMatcher {
    /// Trie entry point, consumes nothing
    Root,
    /// One token equal to the literal, ignoring case
    Word(String),
    /// One word token within a small edit distance of the literal
    Fuzzy(String),
    /// One token of the given kind, bound under `name`
    Capture { name: Arc<str>, kind: CaptureKind },
    Custom(Arc<dyn CustomMatcher>),
}

impl NodeMatcher {
    pub fn word(literal: &str) -> Self {
        NodeMatcher::Word(literal.to_lowercase())
    }

    pub fn capture(name: &str, kind: CaptureKind) -> Self {
        NodeMatcher::Capture {
            name: Arc::from(name),
            kind,
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            NodeMatcher::Root | NodeMatcher::Word(_) => WEIGHT_WORD,
            NodeMatcher::Fuzzy(_) => WEIGHT_FUZZY,
            NodeMatcher::Capture { kind, .. } => kind.weight(),
            NodeMatcher::Custom(custom) => custom.weight(),
        }
    }

    /// Structural equivalence: same kind and same parameters
    pub fn same_as(&self, other: &NodeMatcher) -> bool {
        match (self, other) {
            (NodeMatcher::Root, NodeMatcher::Root) => true,
            (NodeMatcher::Word(a), NodeMatcher::Word(b)) => a == b,
            (NodeMatcher::Fuzzy(a), NodeMatcher::Fuzzy(b)) => a == b,
            (
                NodeMatcher::Capture { name: a, kind: ka },
                NodeMatcher::Capture { name: b, kind: kb },
            ) => a == b && ka == kb,
            (NodeMatcher::Custom(a), NodeMatcher::Custom(b)) => a.key() == b.key(),
            _ => false,
        }
    }

    pub fn try_match<'a>(
        &self,
        tokens: &'a [Token],
        state: &MatchState,
    ) -> Option<(MatchState, &'a [Token])> {
        match self {
            NodeMatcher::Root => Some((state.clone(), tokens)),
            NodeMatcher::Word(literal) => {
                let (head, rest) = tokens.split_first()?;
                head.is_word(literal).then(|| (state.clone(), rest))
            }
            NodeMatcher::Fuzzy(literal) => {
                let (head, rest) = tokens.split_first()?;
                match head {
                    Token::Word(spoken) if fuzzy_match(literal, spoken) => {
                        Some((state.clone(), rest))
                    }
                    _ => None,
                }
            }
            NodeMatcher::Capture { name, kind } => {
                let (head, rest) = tokens.split_first()?;
                kind.accepts(head)
                    .then(|| (state.bind(Arc::clone(name), head.clone()), rest))
            }
            NodeMatcher::Custom(custom) => custom.try_match(tokens, state),
        }
    }
}

impl fmt::Display for NodeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeMatcher::Root => write!(f, "<root>"),
            NodeMatcher::Word(w) => write!(f, "{}", w),
            NodeMatcher::Fuzzy(w) => write!(f, "~{}", w),
            NodeMatcher::Capture { name, kind } => write!(f, "{{{}:{}}}", name, kind.name()),
            NodeMatcher::Custom(custom) => write!(f, "[{}]", custom.key()),
        }
    }
}
