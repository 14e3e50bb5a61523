//! Engine - wires tokenizer, compilers, trie factory and command storage
//!
//! The registration side calls [`Engine::commands_changed`] with the full
//! current command set; the matching side calls [`Engine::recognize`] or
//! [`Engine::segment`] per utterance and hands matches to [`Engine::execute`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::compiler::{CommandCompiler, CompilerRegistry, InvocationPattern};
use crate::error::Result;
use crate::factory::{RebuildReport, TrieFactory};
use crate::matcher::ParsedCommand;
use crate::storage::{Activator, CommandContext, CommandStorage};
use crate::tag::{ActiveTags, TagPolicy};
use crate::token::{self, Token};
use crate::tokenizer::Tokenizer;
use crate::trie::Trie;

/// One command as declared by a plugin
#[derive(Clone)]
pub struct CommandRegistration {
    pub pattern: InvocationPattern,
    pub activator: Activator,
}

impl CommandRegistration {
    pub fn new(pattern: InvocationPattern, activator: Activator) -> Self {
        Self { pattern, activator }
    }
}

impl fmt::Debug for CommandRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistration")
            .field("pattern", &self.pattern)
            .field("activator", &"<function>")
            .finish()
    }
}

/// Result of matching the head of one utterance
#[derive(Debug, Clone)]
pub struct Recognition {
    pub tokens: Vec<Token>,
    pub command: Option<ParsedCommand>,
    /// Unconsumed tokens; all of `tokens` when nothing matched
    pub remaining: Vec<Token>,
}

/// A piece of a segmented utterance
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Command {
        command: ParsedCommand,
        /// Tokens following this command up to the end of the utterance
        trailing: Vec<Token>,
    },
    Dictation(Vec<Token>),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Command { command, .. } => {
                write!(f, "command {}", command.id)?;
                for (name, value) in &command.parameters {
                    write!(f, " {}={}", name, value)?;
                }
                Ok(())
            }
            Segment::Dictation(tokens) => write!(f, "dictation \"{}\"", token::join(tokens)),
        }
    }
}

pub struct EngineBuilder {
    tokenizer: Tokenizer,
    compilers: CompilerRegistry,
    policy: TagPolicy,
    strict: bool,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            tokenizer: Tokenizer::default(),
            compilers: CompilerRegistry::default(),
            policy: TagPolicy::default(),
            strict: false,
        }
    }
}

impl EngineBuilder {
    pub fn tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn compilers(mut self, compilers: CompilerRegistry) -> Self {
        self.compilers = compilers;
        self
    }

    pub fn policy(mut self, policy: TagPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            tokenizer: self.tokenizer,
            factory: TrieFactory::new(CommandCompiler::new(self.compilers), self.policy)
                .with_strict(self.strict),
            storage: CommandStorage::new(),
            update: Mutex::new(()),
        }
    }
}

pub struct Engine {
    tokenizer: Tokenizer,
    factory: TrieFactory,
    storage: CommandStorage,
    /// Held across trie and table publication
    update: Mutex<()>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn factory(&self) -> &TrieFactory {
        &self.factory
    }

    pub fn storage(&self) -> &CommandStorage {
        &self.storage
    }

    pub fn trie(&self) -> Option<Arc<Trie>> {
        self.factory.get()
    }

    /// Rebuild the trie and replace the command table from the full command set.
    ///
    /// Only registrations that compiled enter the table. If the rebuild fails
    /// both the previous trie and the previous table stay in place.
    pub fn commands_changed(&self, registrations: &[CommandRegistration]) -> Result<RebuildReport> {
        let _update = self.update.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let patterns: Vec<InvocationPattern> =
            registrations.iter().map(|r| r.pattern.clone()).collect();
        let report = self.factory.set(&patterns)?;

        // the factory compiles the first registration of each id; later ones are skipped
        let mut table = HashMap::new();
        for registration in registrations {
            let id = &registration.pattern.id;
            if report.compiled.contains(id) && !table.contains_key(id) {
                table.insert(id.clone(), Arc::clone(&registration.activator));
            }
        }
        self.storage.set_available_commands(table);
        Ok(report)
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        self.tokenizer.tokenize(text)
    }

    /// Match a command at the head of `text`
    #[hotpath::measure]
    pub fn recognize(&self, text: &str, tags: &ActiveTags) -> Recognition {
        let tokens = self.tokenize(text);
        let found = self
            .factory
            .get()
            .and_then(|trie| trie.try_traverse(&tokens, tags))
            .map(|m| (m.command, m.remaining.to_vec()));

        match found {
            Some((command, remaining)) => {
                debug!(command = %command.id, remaining = remaining.len(), "recognized");
                Recognition {
                    tokens,
                    command: Some(command),
                    remaining,
                }
            }
            None => {
                debug!(tokens = tokens.len(), "no command matched");
                Recognition {
                    remaining: tokens.clone(),
                    tokens,
                    command: None,
                }
            }
        }
    }

    /// Split an utterance into commands and the dictation between them.
    ///
    /// Matching restarts after every command; a token that starts no command
    /// is passed through as dictation.
    pub fn segment(&self, text: &str, tags: &ActiveTags) -> Vec<Segment> {
        let tokens = self.tokenize(text);
        let trie = self.factory.get();
        let mut segments = Vec::new();
        let mut dictation = Vec::new();
        let mut rest: &[Token] = &tokens;

        while let Some((head, tail)) = rest.split_first() {
            let found = trie
                .as_ref()
                .and_then(|t| t.try_traverse(rest, tags))
                .filter(|m| m.remaining.len() < rest.len());

            match found {
                Some(m) => {
                    if !dictation.is_empty() {
                        segments.push(Segment::Dictation(std::mem::take(&mut dictation)));
                    }
                    segments.push(Segment::Command {
                        command: m.command,
                        trailing: m.remaining.to_vec(),
                    });
                    rest = m.remaining;
                }
                None => {
                    dictation.push(head.clone());
                    rest = tail;
                }
            }
        }

        if !dictation.is_empty() {
            segments.push(Segment::Dictation(dictation));
        }
        segments
    }

    /// Execute a matched command through the current command table
    pub async fn execute(&self, ctx: CommandContext) -> Result<()> {
        let id = ctx.command.id.clone();
        self.storage.execute_command(&id, ctx).await
    }
}
