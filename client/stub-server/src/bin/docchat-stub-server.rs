//! docchat Stub Server
//!
//! Runs the stand-in chat service on a local port.
//!
//! # Usage
//!
//! ```bash
//! # Accept any token on 127.0.0.1:8080
//! docchat-stub-server
//!
//! # Accept only two tokens, with a canned answer
//! docchat-stub-server --tokens alpha,beta --reply "What is X?=X is Y"
//!
//! # With verbose logging
//! RUST_LOG=debug docchat-stub-server
//! ```
//!
//! # Environment Variables
//!
//! - `DOCCHAT_STUB_ADDR`: Listen address (default: 127.0.0.1:8080)
//! - `DOCCHAT_STUB_TOKENS`: Comma-separated accepted tokens (default: any)
//! - `DOCCHAT_STUB_IDLE_SECS`: Idle timeout in seconds (default: 600)
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)
//!
//! Flags take precedence over environment variables.
//!
//! # Signals
//!
//! - SIGINT: Stop accepting connections and exit

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use docchat_stub_server::{config::parse_token_list, StubConfig, StubServer};

/// Local stand-in for the docchat chat service
#[derive(Debug, Parser)]
#[command(name = "docchat-stub-server", version, about)]
struct Args {
    /// Listen address
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Comma-separated tokens to accept (any non-empty token if unset)
    #[arg(long)]
    tokens: Option<String>,

    /// Close connections idle for this many seconds
    #[arg(long)]
    idle_secs: Option<u64>,

    /// Delay between streamed answer snapshots, in milliseconds
    #[arg(long, default_value_t = 20)]
    chunk_delay_ms: u64,

    /// Delay before answering each websocket upgrade, in milliseconds
    #[arg(long, default_value_t = 0)]
    handshake_delay_ms: u64,

    /// Canned answer as QUESTION=ANSWER (repeatable)
    #[arg(long = "reply", value_parser = parse_reply)]
    replies: Vec<(String, String)>,
}

fn parse_reply(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(q, a)| (q.trim().to_string(), a.trim().to_string()))
        .ok_or_else(|| format!("expected QUESTION=ANSWER, got `{raw}`"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docchat_stub_server=info".parse()?),
        )
        .with_target(true)
        .init();

    let args = Args::parse();

    let mut config = StubConfig::from_env().context("Invalid stub server environment")?;
    if let Some(addr) = args.addr {
        config.bind_addr = addr;
    }
    if let Some(ref tokens) = args.tokens {
        config.accepted_tokens = Some(parse_token_list(tokens));
    }
    if let Some(secs) = args.idle_secs {
        config.idle_timeout = Duration::from_secs(secs);
    }
    config.chunk_delay = Duration::from_millis(args.chunk_delay_ms);
    config.handshake_delay = Duration::from_millis(args.handshake_delay_ms);
    for (question, answer) in args.replies {
        config = config.with_reply(question, answer);
    }

    info!(
        addr = %config.bind_addr,
        restricted = config.accepted_tokens.is_some(),
        idle_secs = config.idle_timeout.as_secs(),
        "Starting docchat stub server"
    );

    let server = StubServer::bind(config)
        .await
        .context("Failed to start stub server")?;
    info!(endpoint = %server.endpoint()?, "Ready");

    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Stub server stopped");
    Ok(())
}
