//! utter - compiles spoken command phrases into a prefix trie and matches
//! tokenized utterances against it
//!
//! Plugins register [`InvocationPattern`]s together with an activator. The
//! [`Engine`] compiles them into an immutable [`Trie`] that is swapped in
//! atomically on every change, so matching never waits on registration.

pub mod actions;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod fuzzy;
pub mod matcher;
pub mod pipeline;
pub mod state;
pub mod storage;
pub mod tag;
pub mod token;
pub mod tokenizer;
pub mod trie;

pub use compiler::{CommandCompiler, CompilerRegistry, InvocationPattern, NodeCompiler};
pub use engine::{CommandRegistration, Engine, EngineBuilder, Recognition, Segment};
pub use error::{EngineError, Result};
pub use factory::{RebuildReport, TrieFactory};
pub use matcher::{CaptureKind, CommandId, CustomMatcher, MatchState, NodeMatcher, ParsedCommand};
pub use storage::{Activator, CancelFlag, Command, CommandContext, CommandStorage};
pub use tag::{ActiveTags, Tag, TagPolicy, TagRequirement};
pub use token::{CustomToken, Token};
pub use tokenizer::{SpecializedTokenProcessor, Tokenizer};
pub use trie::{Trie, TrieBuilder, TrieMatch};
