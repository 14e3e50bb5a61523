//! Error taxonomy for command compilation, matching and execution.
use thiserror::Error;

use crate::matcher::CommandId;

/// Errors surfaced by the engine.
///
/// "No command matched" is not represented here; traversal reports it as `None`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A registered phrase could not be compiled. Scoped to one registration.
    #[error("command '{id}' failed to compile: {reason}")]
    CommandCompilation { id: CommandId, reason: String },

    /// A token was projected to a representation its kind does not support.
    #[error("token type mismatch: expected {expected}, found {found}")]
    TokenTypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Execution was requested for an id missing from the current command table.
    #[error("command '{0}' is not available")]
    CommandNotFound(CommandId),

    /// A trie node was finalized before its matcher was assigned.
    #[error("trie node at depth {depth} was built without a matcher")]
    UnassignedMatcher { depth: usize },

    /// Strict rebuild aborted because at least one registration failed to compile.
    #[error("rebuild aborted, {} command(s) failed to compile", failures.len())]
    RebuildFailed { failures: Vec<EngineError> },

    /// A plugin command returned an error while executing.
    #[error("command '{id}' failed: {source}")]
    Execution {
        id: CommandId,
        #[source]
        source: anyhow::Error,
    },

    /// Execution was cancelled before the command finished.
    #[error("command '{0}' was cancelled")]
    Cancelled(CommandId),

    /// Configuration could not be read or parsed.
    #[error("configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// True for errors a caller should treat as "command no longer available".
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::CommandNotFound(_) | EngineError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
