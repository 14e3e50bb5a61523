//! Command compilation - invocation phrases into matcher chains
//!
//! A phrase such as `"set volume {amount:number}"` is read left to right. At
//! each position every registered [`NodeCompiler`] is asked, in registration
//! order, to claim the head of the remaining text; the first to succeed yields
//! one [`NodeMatcher`] and says how much text it consumed.
//!
//! Built-in syntax:
//! - `word` - literal, case-insensitive
//! - `~word` - fuzzy literal
//! - `{name}` / `{name:kind}` - capture, kind one of `word`, `number`, `any`

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::matcher::{CaptureKind, CommandId, NodeMatcher};
use crate::tag::TagRequirement;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{([A-Za-z_][A-Za-z0-9_]*)(?::([A-Za-z]+))?\}(?:\s|$)")
        .expect("valid placeholder regex")
});

/// A tag requirement gating the phrase from word `position` onwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAttachment {
    pub position: usize,
    pub requirement: TagRequirement,
}

/// One registered command pattern, ready to compile
#[derive(Debug, Clone)]
pub struct InvocationPattern {
    pub id: CommandId,
    pub phrase: String,
    pub requirements: Vec<TagAttachment>,
    /// Capture kinds for `{name}` placeholders without an inline kind
    pub captures: BTreeMap<String, CaptureKind>,
    /// Free-form values plugin compilers may consult
    pub values: BTreeMap<String, String>,
}

impl InvocationPattern {
    pub fn new(id: &str, phrase: &str) -> Self {
        Self {
            id: CommandId::new(id),
            phrase: phrase.to_string(),
            requirements: Vec::new(),
            captures: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    /// Gate the whole command
    pub fn with_tags(self, requirement: TagRequirement) -> Self {
        self.with_tags_at(0, requirement)
    }

    /// Gate the command from word `position` onwards
    pub fn with_tags_at(mut self, position: usize, requirement: TagRequirement) -> Self {
        self.requirements.push(TagAttachment { position, requirement });
        self
    }

    pub fn with_capture(mut self, name: &str, kind: CaptureKind) -> Self {
        self.captures.insert(name.to_string(), kind);
        self
    }

    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

/// Plugin point: compiles the head of the remaining phrase into a matcher
pub trait NodeCompiler: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the matcher and the number of bytes of `remaining` consumed
    fn try_compile(
        &self,
        remaining: &str,
        pattern: &InvocationPattern,
        compilers: &CompilerRegistry,
    ) -> Option<(NodeMatcher, usize)>;
}

fn head_word(text: &str) -> &str {
    &text[..text.find(char::is_whitespace).unwrap_or(text.len())]
}

fn is_plain(word: &str) -> bool {
    !word.is_empty() && !word.contains(['{', '}', '~'])
}

/// `{name}` and `{name:kind}` placeholders
pub struct PlaceholderCompiler;

impl NodeCompiler for PlaceholderCompiler {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn try_compile(
        &self,
        remaining: &str,
        pattern: &InvocationPattern,
        _compilers: &CompilerRegistry,
    ) -> Option<(NodeMatcher, usize)> {
        let caps = PLACEHOLDER.captures(remaining)?;
        let name = caps.get(1)?.as_str();
        let kind = match caps.get(2) {
            Some(inline) => inline.as_str().parse().ok()?,
            None => pattern.captures.get(name).copied().unwrap_or_default(),
        };
        let consumed = caps.get(0)?.as_str().trim_end().len();
        Some((NodeMatcher::capture(name, kind), consumed))
    }
}

/// `~word` fuzzy literals
pub struct FuzzyWordCompiler;

impl NodeCompiler for FuzzyWordCompiler {
    fn name(&self) -> &str {
        "fuzzy"
    }

    fn try_compile(
        &self,
        remaining: &str,
        _pattern: &InvocationPattern,
        _compilers: &CompilerRegistry,
    ) -> Option<(NodeMatcher, usize)> {
        let word = head_word(remaining);
        let literal = word.strip_prefix('~')?;
        is_plain(literal).then(|| (NodeMatcher::Fuzzy(literal.to_lowercase()), word.len()))
    }
}

/// Plain literal words
pub struct WordCompiler;

impl NodeCompiler for WordCompiler {
    fn name(&self) -> &str {
        "word"
    }

    fn try_compile(
        &self,
        remaining: &str,
        _pattern: &InvocationPattern,
        _compilers: &CompilerRegistry,
    ) -> Option<(NodeMatcher, usize)> {
        let word = head_word(remaining);
        is_plain(word).then(|| (NodeMatcher::word(word), word.len()))
    }
}

/// Ordered set of node compilers; earlier entries are asked first
#[derive(Clone)]
pub struct CompilerRegistry {
    compilers: Vec<Arc<dyn NodeCompiler>>,
}

impl Default for CompilerRegistry {
    fn default() -> Self {
        Self::builtin(true)
    }
}

impl CompilerRegistry {
    pub fn new() -> Self {
        Self {
            compilers: Vec::new(),
        }
    }

    /// Placeholders, then fuzzy literals (when enabled), then plain words
    pub fn builtin(fuzzy: bool) -> Self {
        let mut registry = Self::new().with_compiler(Arc::new(PlaceholderCompiler));
        if fuzzy {
            registry = registry.with_compiler(Arc::new(FuzzyWordCompiler));
        }
        registry.with_compiler(Arc::new(WordCompiler))
    }

    /// Append a compiler, asked after every earlier one
    pub fn with_compiler(mut self, compiler: Arc<dyn NodeCompiler>) -> Self {
        self.compilers.push(compiler);
        self
    }

    /// Insert a compiler ahead of all registered ones
    pub fn with_leading_compiler(mut self, compiler: Arc<dyn NodeCompiler>) -> Self {
        self.compilers.insert(0, compiler);
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.compilers.iter().map(|c| c.name()).collect()
    }

    /// First compiler in registration order to claim the head of `remaining`
    pub fn compile_head(
        &self,
        remaining: &str,
        pattern: &InvocationPattern,
    ) -> Option<(NodeMatcher, usize)> {
        self.compilers.iter().find_map(|compiler| {
            compiler
                .try_compile(remaining, pattern, self)
                .filter(|(_, used)| {
                    *used > 0 && *used <= remaining.len() && remaining.is_char_boundary(*used)
                })
        })
    }
}

/// One compiled position: its matcher and the requirement gating it
#[derive(Debug, Clone)]
pub struct CompiledStep {
    pub matcher: NodeMatcher,
    pub requirement: TagRequirement,
}

#[derive(Debug, Clone)]
pub struct CompiledCommand {
    pub id: CommandId,
    pub steps: Vec<CompiledStep>,
}

impl CompiledCommand {
    /// Requirement of the whole command: the one carried by its last step
    pub fn requirement(&self) -> TagRequirement {
        self.steps
            .last()
            .map(|s| s.requirement.clone())
            .unwrap_or_default()
    }
}

/// Compiles one pattern at a time against a compiler registry
#[derive(Clone, Default)]
pub struct CommandCompiler {
    registry: CompilerRegistry,
}

impl CommandCompiler {
    pub fn new(registry: CompilerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CompilerRegistry {
        &self.registry
    }

    pub fn compile(&self, pattern: &InvocationPattern) -> Result<CompiledCommand> {
        let fail = |reason: String| EngineError::CommandCompilation {
            id: pattern.id.clone(),
            reason,
        };

        let mut matchers = Vec::new();
        let mut rest = pattern.phrase.trim_start();
        while !rest.is_empty() {
            let (matcher, used) = self
                .registry
                .compile_head(rest, pattern)
                .ok_or_else(|| fail(format!("no compiler accepts '{}'", head_word(rest))))?;
            matchers.push(matcher);
            rest = rest[used..].trim_start();
        }

        if matchers.is_empty() {
            return Err(fail("empty invocation phrase".to_string()));
        }
        if let Some(stray) = pattern.requirements.iter().find(|a| a.position >= matchers.len()) {
            return Err(fail(format!(
                "tags {} attached at word {} of a {}-word phrase",
                stray.requirement,
                stray.position,
                matchers.len()
            )));
        }

        let steps = matchers
            .into_iter()
            .enumerate()
            .map(|(index, matcher)| {
                let requirement = pattern
                    .requirements
                    .iter()
                    .filter(|a| a.position <= index)
                    .fold(TagRequirement::empty(), |acc, a| acc.union(&a.requirement));
                CompiledStep { matcher, requirement }
            })
            .collect::<Vec<_>>();

        debug!(command = %pattern.id, steps = steps.len(), "compiled command");
        Ok(CompiledCommand {
            id: pattern.id.clone(),
            steps,
        })
    }
}
