use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use utter::actions;
use utter::config::Config;
use utter::fuzzy::strip_punctuation;
use utter::pipeline::Pipeline;
use utter::state::{RuntimeState, SharedState};
use utter::{CommandRegistration, CompilerRegistry, Engine};

#[derive(Parser)]
#[command(name = "utter")]
struct Cli {
    /// Command configuration file
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read utterances from stdin, one per line (default)
    Run,
    /// Segment one utterance and print the result
    Match { text: Vec<String> },
    /// Print the compiled command trie
    Tree,
}

#[hotpath::main]
fn main() -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    init_tracing(&config.log_filter)?;

    let state = RuntimeState::new(&config);
    let engine = Arc::new(
        Engine::builder()
            .compilers(CompilerRegistry::builtin(config.fuzzy_words))
            .policy(config.tag_policy)
            .strict(config.strict_rebuild)
            .build(),
    );

    let (out_tx, out_rx) = flume::unbounded::<String>();
    engine.commands_changed(&actions::registrations(&config, &state, &out_tx))?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Tree => match engine.trie() {
            Some(trie) => print!("{}", trie),
            None => println!("(no commands)"),
        },
        Command::Match { text } => {
            let text = strip_punctuation(&text.join(" "));
            for segment in engine.segment(&text, &state.tags()) {
                println!("{}", segment);
            }
        }
        Command::Run => run(cli.config, engine, state, out_tx, out_rx).await?,
    }
    Ok(())
}

fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()?;
    Ok(())
}

async fn run(
    config_path: PathBuf,
    engine: Arc<Engine>,
    state: SharedState,
    out_tx: flume::Sender<String>,
    out_rx: flume::Receiver<String>,
) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(Arc::clone(&engine), Arc::clone(&state));

    let cancel = pipeline.cancel_flag();
    let r = Arc::clone(&state);
    ctrlc::set_handler(move || {
        r.stop();
        cancel.cancel();
    })?;

    let (input_tx, input_rx) = flume::bounded::<String>(16);
    let (reg_tx, reg_rx) = flume::unbounded::<Vec<CommandRegistration>>();

    // stdin reader, never joined: it stays blocked on read until process exit
    let reader_state = Arc::clone(&state);
    let reader_out = out_tx.clone();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let sent = match line {
                ":reload" => match Config::load(&config_path) {
                    Ok(config) => reg_tx
                        .send(actions::registrations(&config, &reader_state, &reader_out))
                        .is_ok(),
                    Err(e) => {
                        error!(error = %e, "reload failed");
                        true
                    }
                },
                ":tags" => reader_out
                    .send(format!("tags: {}", reader_state.tag_names().join(", ")))
                    .is_ok(),
                _ => input_tx.send(line.to_string()).is_ok(),
            };
            if !sent {
                break;
            }
        }
    });

    let printer_state = Arc::clone(&state);
    let printer = thread::spawn(move || {
        while printer_state.is_running() {
            match out_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(line) => println!("{}", line),
                Err(flume::RecvTimeoutError::Timeout) => continue,
                Err(flume::RecvTimeoutError::Disconnected) => break,
            }
        }
        // Drain remaining
        for line in out_rx.drain() {
            println!("{}", line);
        }
    });

    eprintln!("Listening on stdin... Press Ctrl+C to stop.");
    pipeline.run(input_rx, reg_rx, out_tx).await?;
    let _ = printer.join();

    info!(
        executed = state.executed.load(Ordering::Relaxed),
        failed = state.failed.load(Ordering::Relaxed),
        "session ended"
    );
    Ok(())
}
