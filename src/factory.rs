//! Trie factory - owns and atomically republishes the compiled trie
//!
//! Readers call [`TrieFactory::get`] and receive an `Arc` to a fully built,
//! immutable trie; they never lock. Rebuilds happen off to the side and are
//! published with a single pointer swap, so a reader sees either the old trie
//! or the new one in full.

use arc_swap::ArcSwapOption;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::compiler::{CommandCompiler, InvocationPattern};
use crate::error::{EngineError, Result};
use crate::matcher::CommandId;
use crate::tag::TagPolicy;
use crate::trie::{Trie, TrieBuilder};

/// Outcome of a successful rebuild
#[derive(Debug, Default)]
pub struct RebuildReport {
    /// Commands folded into the published trie, in registration order
    pub compiled: Vec<CommandId>,
    /// Registrations left out, each with its compilation error
    pub skipped: Vec<EngineError>,
    pub generation: u64,
}

pub struct TrieFactory {
    current: ArcSwapOption<Trie>,
    compiler: CommandCompiler,
    policy: TagPolicy,
    strict: bool,
    generation: AtomicU64,
    // serializes writers; readers never touch it
    writer: Mutex<()>,
}

impl TrieFactory {
    pub fn new(compiler: CommandCompiler, policy: TagPolicy) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            compiler,
            policy,
            strict: false,
            generation: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    /// In strict mode one uncompilable registration aborts the whole rebuild
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Currently published trie, `None` when no command is registered
    pub fn get(&self) -> Option<Arc<Trie>> {
        self.current.load_full()
    }

    /// Number of successful publications so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Recompile everything from `patterns` and publish the result.
    ///
    /// On error nothing is published and the previous trie stays current.
    pub fn set(&self, patterns: &[InvocationPattern]) -> Result<RebuildReport> {
        let _writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut builder = TrieBuilder::new(self.policy);
        let mut seen = HashSet::new();
        let mut report = RebuildReport::default();

        for pattern in patterns {
            let compiled = if seen.insert(pattern.id.clone()) {
                self.compiler.compile(pattern)
            } else {
                Err(EngineError::CommandCompilation {
                    id: pattern.id.clone(),
                    reason: "duplicate command id".to_string(),
                })
            };

            match compiled {
                Ok(command) => {
                    builder.insert(&command);
                    report.compiled.push(command.id);
                }
                Err(err) => {
                    warn!(command = %pattern.id, error = %err, "skipping command");
                    report.skipped.push(err);
                }
            }
        }

        if self.strict && !report.skipped.is_empty() {
            return Err(EngineError::RebuildFailed {
                failures: report.skipped,
            });
        }

        let next = if builder.is_empty() {
            None
        } else {
            Some(Arc::new(builder.build()?))
        };
        self.current.store(next);
        report.generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        info!(
            generation = report.generation,
            compiled = report.compiled.len(),
            skipped = report.skipped.len(),
            "published command trie"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::ActiveTags;
    use crate::tokenizer::Tokenizer;

    fn factory() -> TrieFactory {
        TrieFactory::new(CommandCompiler::default(), TagPolicy::Any)
    }

    #[test]
    fn test_empty_set_publishes_none() {
        let factory = factory();
        assert!(factory.get().is_none());
        let report = factory.set(&[]).unwrap();
        assert!(report.compiled.is_empty());
        assert!(factory.get().is_none());
        assert_eq!(factory.generation(), 1);
    }

    #[test]
    fn test_bad_command_is_isolated() {
        let factory = factory();
        let report = factory
            .set(&[
                InvocationPattern::new("ok", "open file"),
                InvocationPattern::new("bad", "open {file"),
                InvocationPattern::new("ok", "open again"),
            ])
            .unwrap();
        assert_eq!(report.compiled, vec![CommandId::new("ok")]);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped[1].to_string().contains("duplicate"));

        let trie = factory.get().unwrap();
        assert_eq!(trie.command_count(), 1);
    }

    #[test]
    fn test_strict_rebuild_keeps_previous_trie() {
        let factory = factory().with_strict(true);
        factory.set(&[InvocationPattern::new("a", "alpha")]).unwrap();
        let before = factory.get().unwrap();

        let err = factory
            .set(&[InvocationPattern::new("b", "beta"), InvocationPattern::new("c", "{")])
            .unwrap_err();
        assert!(matches!(err, EngineError::RebuildFailed { ref failures } if failures.len() == 1));

        let after = factory.get().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(factory.generation(), 1);
    }

    #[test]
    fn test_set_replaces_whole_trie() {
        let factory = factory();
        factory.set(&[InvocationPattern::new("a", "alpha")]).unwrap();
        let old = factory.get().unwrap();
        factory.set(&[InvocationPattern::new("b", "beta")]).unwrap();

        let tokens = Tokenizer::default().tokenize("alpha");
        let tags = ActiveTags::new();
        // a reader holding the old trie keeps a consistent view
        assert!(old.try_traverse(&tokens, &tags).is_some());
        assert!(factory.get().unwrap().try_traverse(&tokens, &tags).is_none());
    }
}
