//! Command storage - the executable command table
//!
//! Maps command ids to activators. The whole table is swapped atomically
//! whenever the registered command set changes; execution always looks ids up
//! in the table current at that moment and builds a fresh command instance.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{debug, error};

use crate::error::{EngineError, Result};
use crate::matcher::{CommandId, ParsedCommand};
use crate::tag::ActiveTags;
use crate::token::Token;

/// A plugin command. One instance serves exactly one execution.
#[async_trait]
pub trait Command: Send {
    async fn execute(&mut self, ctx: &CommandContext) -> anyhow::Result<()>;
}

/// Builds a fresh command instance per execution
pub type Activator = Arc<dyn Fn() -> Box<dyn Command> + Send + Sync>;

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation signal shared between caller and command
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelInner>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.0.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Everything a command sees when it runs
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub command: ParsedCommand,
    /// Tokens left over after the command phrase
    pub remaining: Vec<Token>,
    /// Tags active when the command matched
    pub tags: ActiveTags,
    pub cancel: CancelFlag,
}

impl CommandContext {
    pub fn new(command: ParsedCommand) -> Self {
        Self {
            command,
            remaining: Vec::new(),
            tags: ActiveTags::new(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_remaining(mut self, remaining: Vec<Token>) -> Self {
        self.remaining = remaining;
        self
    }

    pub fn with_tags(mut self, tags: ActiveTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&Token> {
        self.command.parameter(name)
    }
}

pub struct CommandStorage {
    table: ArcSwap<HashMap<CommandId, Activator>>,
}

impl Default for CommandStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandStorage {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Replace the whole command table in one swap
    pub fn set_available_commands(&self, commands: HashMap<CommandId, Activator>) {
        debug!(commands = commands.len(), "replacing command table");
        self.table.store(Arc::new(commands));
    }

    pub fn contains(&self, id: &CommandId) -> bool {
        self.table.load().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.load().is_empty()
    }

    /// Run the command registered under `id` with a fresh instance.
    ///
    /// Fails with `CommandNotFound` when the id left the table after matching,
    /// and with `Cancelled` if `ctx.cancel` fires before the command finishes.
    pub async fn execute_command(&self, id: &CommandId, ctx: CommandContext) -> Result<()> {
        let activator = self
            .table
            .load()
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::CommandNotFound(id.clone()))?;

        let mut command = activator();
        let cancel = ctx.cancel.clone();

        tokio::select! {
            result = command.execute(&ctx) => result.map_err(|source| {
                error!(command = %id, error = %source, "command failed");
                EngineError::Execution { id: id.clone(), source }
            }),
            _ = cancel.cancelled() => {
                debug!(command = %id, "command cancelled");
                Err(EngineError::Cancelled(id.clone()))
            }
        }
    }
}
