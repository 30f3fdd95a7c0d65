//! Bearer Tokens
//!
//! The chat service authorizes each websocket connection with a short-lived
//! bearer token issued by an external identity provider. The core never
//! mints tokens itself: it asks a [`TokenProvider`] for the current value and
//! reconnects whenever that value changes.
//!
//! # Refresh
//!
//! [`TokenRefresher`] polls a provider on a fixed interval and publishes the
//! result on a `watch` channel. Only changed values are published, so the
//! session loop sees exactly one notification per rotation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Errors related to token acquisition
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token command exited unsuccessfully
    #[error("token command `{command}` failed ({status}): {stderr}")]
    CommandFailed {
        /// The command that was run
        command: String,
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// The token command could not be spawned
    #[error("failed to run token command: {0}")]
    Io(#[from] std::io::Error),
}

/// An opaque bearer token
///
/// Always non-empty: [`Token::new`] maps empty and whitespace-only input to
/// `None`, which the session treats as "no token".
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token value, trimming surrounding whitespace
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The raw token value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} bytes>)", self.0.len())
    }
}

/// Source of the current bearer token
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch the current token; `Ok(None)` means unauthenticated
    async fn current_token(&self) -> Result<Option<Token>, TokenError>;
}

/// A fixed token (or none)
#[derive(Clone, Debug, Default)]
pub struct StaticTokenProvider {
    token: Option<Token>,
}

impl StaticTokenProvider {
    /// Provider that always returns `raw` (or nothing if it is blank)
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self {
            token: Token::new(raw),
        }
    }

    /// Provider that never yields a token
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn current_token(&self) -> Result<Option<Token>, TokenError> {
        Ok(self.token.clone())
    }
}

/// Reads the token from an environment variable on every call
#[derive(Clone, Debug)]
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    /// Default variable consulted when none is configured
    pub const DEFAULT_VAR: &'static str = "DOCCHAT_TOKEN";

    /// Provider reading `var`
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// The variable name
    #[must_use]
    pub fn var(&self) -> &str {
        &self.var
    }
}

impl Default for EnvTokenProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn current_token(&self) -> Result<Option<Token>, TokenError> {
        Ok(std::env::var(&self.var).ok().and_then(Token::new))
    }
}

/// Runs a shell command and uses its trimmed stdout as the token
///
/// Suited to CLIs that print an identity token, e.g.
/// `gcloud auth print-identity-token`.
#[derive(Clone, Debug)]
pub struct CommandTokenProvider {
    command: String,
}

impl CommandTokenProvider {
    /// Provider running `command` through `sh -c`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for CommandTokenProvider {
    async fn current_token(&self) -> Result<Option<Token>, TokenError> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(TokenError::CommandFailed {
                command: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(Token::new(String::from_utf8_lossy(&output.stdout)))
    }
}

/// Periodically polls a [`TokenProvider`] and publishes changes
pub struct TokenRefresher {
    provider: Arc<dyn TokenProvider>,
    interval: Duration,
}

impl TokenRefresher {
    /// Create a refresher polling `provider` every `interval`
    ///
    /// A zero interval is raised to one millisecond.
    pub fn new(provider: Arc<dyn TokenProvider>, interval: Duration) -> Self {
        Self {
            provider,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Start polling in a background task
    ///
    /// The receiver starts at `None` (acquisition pending). The first poll
    /// happens immediately. The task ends once every receiver is dropped.
    pub fn spawn(self) -> (watch::Receiver<Option<Token>>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(self.run(tx));
        (rx, handle)
    }

    async fn run(self, tx: watch::Sender<Option<Token>>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = tx.closed() => break,
            }

            match self.provider.current_token().await {
                Ok(token) => {
                    let changed = tx.send_if_modified(|current| {
                        if *current == token {
                            false
                        } else {
                            *current = token;
                            true
                        }
                    });
                    if changed {
                        tracing::info!(present = tx.borrow().is_some(), "Token changed");
                    }
                }
                // Keep the previous value so a transient failure does not
                // tear down a working connection
                Err(e) => tracing::warn!(error = %e, "Token refresh failed"),
            }
        }

        tracing::debug!("Token refresher stopped");
    }
}
