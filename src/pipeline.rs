//! Utterance pipeline - text in, commands and dictation out
//!
//! ```text
//! input ──► matcher thread ──► work ──► executor (async) ──► output
//!                ▲
//! registrations ─┴─► registrar thread (rebuilds trie + table)
//! ```
//!
//! The matcher and the registrar run on their own threads so a rebuild never
//! stalls matching; readers keep using the previous trie until the new one is
//! published.

use flume::{Receiver, Sender};
use futures_util::StreamExt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::engine::{CommandRegistration, Engine, Segment};
use crate::error::{EngineError, Result};
use crate::fuzzy::strip_punctuation;
use crate::state::SharedState;
use crate::storage::{CancelFlag, CommandContext};
use crate::token;

const POLL: Duration = Duration::from_millis(100);

/// A unit of work for the executor
#[derive(Debug)]
pub enum Work {
    Command(CommandContext),
    Dictation(String),
}

/// Match utterances until input closes or the session stops
pub fn run_matcher(
    rx: Receiver<String>,
    tx: Sender<Work>,
    engine: Arc<Engine>,
    state: SharedState,
    cancel: CancelFlag,
) {
    while state.is_running() {
        match rx.recv_timeout(POLL) {
            Ok(text) => {
                if !forward(&text, &tx, &engine, &state, &cancel) {
                    break;
                }
            }
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("matcher stopped");
}

fn forward(
    text: &str,
    tx: &Sender<Work>,
    engine: &Engine,
    state: &SharedState,
    cancel: &CancelFlag,
) -> bool {
    let cleaned = strip_punctuation(text);
    let tags = state.tags();
    for segment in engine.segment(&cleaned, &tags) {
        let work = match segment {
            Segment::Command { command, trailing } => Work::Command(
                CommandContext::new(command)
                    .with_remaining(trailing)
                    .with_tags((*tags).clone())
                    .with_cancel(cancel.clone()),
            ),
            Segment::Dictation(tokens) => Work::Dictation(token::join(&tokens)),
        };
        if tx.send(work).is_err() {
            return false;
        }
    }
    true
}

/// Apply command set changes until the channel closes or the session stops
pub fn run_registrar(
    rx: Receiver<Vec<CommandRegistration>>,
    engine: Arc<Engine>,
    state: SharedState,
) {
    while state.is_running() {
        match rx.recv_timeout(POLL) {
            Ok(batch) => match engine.commands_changed(&batch) {
                Ok(report) => debug!(
                    generation = report.generation,
                    compiled = report.compiled.len(),
                    skipped = report.skipped.len(),
                    "commands updated"
                ),
                Err(e) => error!(error = %e, "command update rejected, keeping previous commands"),
            },
            Err(flume::RecvTimeoutError::Timeout) => continue,
            Err(flume::RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("registrar stopped");
}

/// Execute work items in order. Ends when the work stream closes or a command
/// stops the session.
pub async fn run_executor(
    rx: Receiver<Work>,
    engine: Arc<Engine>,
    state: SharedState,
    out: Sender<String>,
) {
    let mut stream = rx.into_stream();
    while let Some(work) = stream.next().await {
        match work {
            Work::Dictation(text) => {
                if out.send(text).is_err() {
                    break;
                }
            }
            Work::Command(ctx) => {
                let id = ctx.command.id.clone();
                match engine.execute(ctx).await {
                    Ok(()) => {
                        state.executed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        debug!(command = %id, "executed");
                    }
                    Err(EngineError::Cancelled(_)) => info!(command = %id, "cancelled"),
                    Err(e @ EngineError::CommandNotFound(_)) => {
                        state.failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        warn!(error = %e, "command unregistered after matching");
                    }
                    Err(e) => {
                        state.failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        error!(command = %id, error = %e, "command failed");
                    }
                }
            }
        }
        if !state.is_running() {
            break;
        }
    }
    debug!("executor stopped");
}

/// The three pipeline stages sharing one engine and session state
pub struct Pipeline {
    engine: Arc<Engine>,
    state: SharedState,
    cancel: CancelFlag,
}

impl Pipeline {
    pub fn new(engine: Arc<Engine>, state: SharedState) -> Self {
        Self {
            engine,
            state,
            cancel: CancelFlag::new(),
        }
    }

    /// Fires for the running command on shutdown
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run until `input` closes or the session stops
    pub async fn run(
        self,
        input: Receiver<String>,
        registrations: Receiver<Vec<CommandRegistration>>,
        out: Sender<String>,
    ) -> Result<()> {
        let (work_tx, work_rx) = flume::bounded::<Work>(32);

        let engine = Arc::clone(&self.engine);
        let state = Arc::clone(&self.state);
        let registrar = thread::spawn(move || run_registrar(registrations, engine, state));

        let engine = Arc::clone(&self.engine);
        let state = Arc::clone(&self.state);
        let cancel = self.cancel.clone();
        let matcher = thread::spawn(move || run_matcher(input, work_tx, engine, state, cancel));

        run_executor(work_rx, Arc::clone(&self.engine), Arc::clone(&self.state), out).await;
        self.state.stop();

        if matcher.join().is_err() {
            error!("matcher thread panicked");
        }
        if registrar.join().is_err() {
            error!("registrar thread panicked");
        }
        Ok(())
    }
}
