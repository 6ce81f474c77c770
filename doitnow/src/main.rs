//! `DoItNow`: personal task tracker with live sync.
//!
//! Reads commands from stdin and prints the filtered task list after each
//! change. Configuration via CLI flags, environment variables, or config
//! file (`~/.config/doitnow/config.toml`).
//!
//! ```bash
//! # Start signed out
//! cargo run --bin doitnow
//!
//! # Sign in at startup with tasks seeded from a snapshot file
//! cargo run --bin doitnow -- --owner alice --seed tasks.json
//!
//! # Or via environment variables
//! DOITNOW_OWNER=alice DOITNOW_LOG=debug cargo run
//! ```

use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_appender::non_blocking::WorkerGuard;

use doitnow::app::{App, Command};
use doitnow::config::{self, CliArgs, ClientConfig};
use doitnow::remote::memory::InMemoryRemote;
use doitnow_proto::task::OwnerId;

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = CliArgs::parse();

    // Logs go to a file; stdout belongs to the command loop.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    // Load and resolve configuration (CLI args > env > config file > defaults).
    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config file: {e}");
            ClientConfig::default()
        }
    };

    tracing::info!(
        config_path = ?config::default_config_path().ok(),
        week_start = ?config.week_start,
        "doitnow starting"
    );

    let remote = Arc::new(InMemoryRemote::new());
    if let Some(path) = &config.seed_file {
        match std::fs::read(path) {
            Ok(bytes) => {
                if let Err(e) = remote.seed_from_snapshot(&bytes).await {
                    eprintln!("Warning: could not seed tasks from {}: {e}", path.display());
                }
            }
            Err(e) => eprintln!("Warning: could not read {}: {e}", path.display()),
        }
    }

    let result = run(remote, &config).await;
    tracing::info!("doitnow exiting");
    result
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown to ensure all
/// buffered log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("doitnow.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Main command loop: stdin lines and sync outcomes, one at a time.
async fn run(remote: Arc<InMemoryRemote>, config: &ClientConfig) -> io::Result<()> {
    let (events_tx, mut events_rx) = mpsc::channel(config.event_buffer);
    let mut app = App::new(remote, config, events_tx);
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let now = || Local::now().fixed_offset();

    let mut out = vec!["DoItNow. Type `help` for commands.".to_string()];
    out.extend(app.render(now()));
    if let Some(owner) = &config.owner_id {
        let login = Command::Login(OwnerId::new(owner.trim()));
        out.extend(app.handle_command(login, now()).await);
    }
    print_lines(&mut stdout, &out).await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let out = app.handle_line(&line, now()).await;
                print_lines(&mut stdout, &out).await?;
                if app.should_quit {
                    break;
                }
            }
            Some(event) = events_rx.recv() => {
                tracing::debug!(?event, "sync event");
                let out = app.on_sync_event(&event, now());
                print_lines(&mut stdout, &out).await?;
            }
        }
    }
    Ok(())
}

async fn print_lines(stdout: &mut tokio::io::Stdout, lines: &[String]) -> io::Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    let mut buf = lines.join("\n");
    buf.push('\n');
    stdout.write_all(buf.as_bytes()).await?;
    stdout.flush().await
}
