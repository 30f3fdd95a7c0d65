//! docchat Terminal Entry Point
//!
//! Line-oriented chat client for the docchat service.
//!
//! Usage:
//!   docchat [OPTIONS]
//!
//! Options:
//!   --uri <URI>               Websocket endpoint (overrides config)
//!   --token <TOKEN>           Fixed access token
//!   --token-command <CMD>     Shell command printing the current token
//!   --config <PATH>           Config file (default: ~/.config/docchat/client.toml)
//!
//! Without `--token` or a token command, the token is read from the
//! environment variable named in the config (`DOCCHAT_TOKEN` by default).

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docchat_core::{
    load_config_from_path, AlertId, ClientConfig, CommandTokenProvider, ConfigOverrides,
    EnvTokenProvider, SendOutcome, SessionHandle, SessionPhase, SessionRunner, SessionUpdate,
    StaticTokenProvider, TokenProvider, TranscriptSnapshot, WebSocketConnector,
};
use docchat_term::display::{phase_notice, render_alert};
use docchat_term::input::HELP;
use docchat_term::{Input, TranscriptView};

/// Quiet period before a streaming reply is printed
const RENDER_DEBOUNCE: Duration = Duration::from_millis(150);

/// Chat with the docchat service from a terminal
#[derive(Debug, Parser)]
#[command(name = "docchat", version, about)]
struct Args {
    /// Websocket endpoint, e.g. ws://127.0.0.1:8080/chat
    #[arg(long)]
    uri: Option<String>,

    /// Fixed access token
    #[arg(long)]
    token: Option<String>,

    /// Shell command whose output is the current token
    #[arg(long)]
    token_command: Option<String>,

    /// Greeting shown as the first turn
    #[arg(long)]
    greeting: Option<String>,

    /// Connect timeout in milliseconds
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Token refresh interval in seconds
    #[arg(long)]
    token_refresh_secs: Option<u64>,

    /// Config file path
    #[arg(long, env = "DOCCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Wrap output at this many columns
    #[arg(long, default_value_t = 80)]
    width: usize,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            websocket_uri: self.uri.clone(),
            connect_timeout_ms: self.connect_timeout_ms,
            greeting: self.greeting.clone(),
            token_refresh_secs: self.token_refresh_secs,
            token_command: self.token_command.clone(),
        }
    }
}

fn token_provider(args: &Args, config: &ClientConfig) -> Arc<dyn TokenProvider> {
    if let Some(ref token) = args.token {
        return Arc::new(StaticTokenProvider::new(token));
    }
    if let Some(ref command) = config.token_command {
        return Arc::new(CommandTokenProvider::new(command.clone()));
    }
    Arc::new(EnvTokenProvider::new(config.token_env_var.clone()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let config = load_config_from_path(args.config.clone(), &args.overrides())
        .context("Failed to load configuration")?;

    tracing::info!(
        uri = %config.websocket_uri,
        source = %config.source(),
        "Configuration loaded"
    );

    let provider = token_provider(&args, &config);
    let connector = Arc::new(WebSocketConnector::new(config.connect_timeout));
    let session = SessionRunner::spawn(config, provider, connector);

    run(session, args.width).await
}

async fn run(mut session: SessionHandle, width: usize) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut view = TranscriptView::new();
    let mut alerts: BTreeMap<AlertId, String> = BTreeMap::new();
    let mut latest: Option<TranscriptSnapshot> = None;
    let mut flush_at: Option<Instant> = None;
    let mut stdout = std::io::stdout();

    loop {
        let deadline = flush_at.unwrap_or_else(Instant::now);

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match Input::parse(&line) {
                    Input::Message(text) => match session.send(text).await? {
                        SendOutcome::Sent => {}
                        SendOutcome::Rejected(reason) => {
                            writeln!(stdout, "[not sent: {reason}]")?;
                        }
                    },
                    Input::ListAlerts => {
                        if alerts.is_empty() {
                            writeln!(stdout, "[no alerts]")?;
                        }
                        for (id, text) in &alerts {
                            writeln!(stdout, "! [{id}] {text}")?;
                        }
                    }
                    Input::Dismiss(id) => session.dismiss_alert(id).await?,
                    Input::Help => writeln!(stdout, "{HELP}")?,
                    Input::Quit => break,
                    Input::Blank => {}
                    Input::Invalid(msg) => writeln!(stdout, "[{msg}]")?,
                }
            }

            () = tokio::time::sleep_until(deadline), if flush_at.is_some() => {
                flush_at = None;
                if let Some(snapshot) = latest.take() {
                    for line in view.update(&snapshot) {
                        writeln!(stdout, "{}", line.render(width))?;
                    }
                }
            }

            update = session.recv_update() => {
                let Some(update) = update else {
                    break;
                };
                match update {
                    SessionUpdate::Transcript(snapshot) => {
                        // Loading placeholders and user turns show at once;
                        // streamed revisions wait for a quiet period
                        if snapshot.pending {
                            for line in view.update(&snapshot) {
                                writeln!(stdout, "{}", line.render(width))?;
                            }
                            latest = None;
                            flush_at = None;
                        } else {
                            latest = Some(snapshot);
                            flush_at = Some(Instant::now() + RENDER_DEBOUNCE);
                        }
                    }
                    SessionUpdate::Alert(alert) => {
                        writeln!(stdout, "{}", render_alert(&alert, width))?;
                        alerts.insert(alert.id, alert.text);
                    }
                    SessionUpdate::AlertDismissed(id) => {
                        alerts.remove(&id);
                    }
                    SessionUpdate::Phase(phase) => {
                        if let Some(notice) = phase_notice(phase) {
                            writeln!(stdout, "{notice}")?;
                        }
                        if phase == SessionPhase::TornDown {
                            break;
                        }
                    }
                }
            }
        }

        stdout.flush()?;
    }

    if let Some(snapshot) = latest.take() {
        for line in view.update(&snapshot) {
            writeln!(stdout, "{}", line.render(width))?;
        }
    }
    session.teardown().await;
    Ok(())
}
