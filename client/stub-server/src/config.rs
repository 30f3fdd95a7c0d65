//! Stub server configuration

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Message sent when no user message arrives within the idle timeout
pub const IDLE_TIMEOUT_MESSAGE: &str =
    "Timeout: No message received, connection closing. Refresh page.";

/// Message sent after a successful token check
pub const AUTHENTICATED_MESSAGE: &str = "Authenticated successfully";

/// Errors from configuring or starting the stub server
#[derive(Debug, Error)]
pub enum StubError {
    /// An environment variable holds an unusable value
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Offending value
        value: String,
    },

    /// The listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// Underlying error
        source: std::io::Error,
    },

    /// Any other socket error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// How the stub server behaves
#[derive(Clone, Debug)]
pub struct StubConfig {
    /// Listen address (port 0 picks a free port)
    pub bind_addr: SocketAddr,
    /// Tokens accepted on `/chat?token=`; `None` accepts any non-empty token
    pub accepted_tokens: Option<HashSet<String>>,
    /// Close a connection after this long without a user message
    pub idle_timeout: Duration,
    /// Pause between successive reply snapshots
    pub chunk_delay: Duration,
    /// Canned answers keyed by the exact (trimmed) question
    pub replies: HashMap<String, String>,
    /// Wait this long before answering the websocket upgrade
    pub handshake_delay: Duration,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            accepted_tokens: None,
            idle_timeout: Duration::from_secs(600),
            chunk_delay: Duration::from_millis(20),
            replies: HashMap::new(),
            handshake_delay: Duration::ZERO,
        }
    }
}

impl StubConfig {
    /// Defaults overridden by `DOCCHAT_STUB_ADDR`, `DOCCHAT_STUB_TOKENS`
    /// (comma-separated) and `DOCCHAT_STUB_IDLE_SECS`
    ///
    /// # Errors
    ///
    /// Returns `StubError::InvalidEnv` when a variable does not parse.
    pub fn from_env() -> Result<Self, StubError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`
    ///
    /// # Errors
    ///
    /// Returns `StubError::InvalidEnv` when a variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StubError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("DOCCHAT_STUB_ADDR") {
            config.bind_addr = addr.parse().map_err(|_| StubError::InvalidEnv {
                var: "DOCCHAT_STUB_ADDR",
                value: addr.clone(),
            })?;
        }
        if let Some(tokens) = lookup("DOCCHAT_STUB_TOKENS") {
            config.accepted_tokens = Some(parse_token_list(&tokens));
        }
        if let Some(secs) = lookup("DOCCHAT_STUB_IDLE_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| StubError::InvalidEnv {
                var: "DOCCHAT_STUB_IDLE_SECS",
                value: secs.clone(),
            })?;
            config.idle_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Accept only `tokens`
    #[must_use]
    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted_tokens = Some(tokens.into_iter().map(Into::into).collect());
        self
    }

    /// Answer `question` with `answer`
    #[must_use]
    pub fn with_reply(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.replies.insert(question.into(), answer.into());
        self
    }

    /// Whether `token` may open a connection
    #[must_use]
    pub fn accepts(&self, token: &str) -> bool {
        if token.trim().is_empty() {
            return false;
        }
        self.accepted_tokens
            .as_ref()
            .map_or(true, |accepted| accepted.contains(token))
    }
}

/// Split a comma-separated token list, dropping blanks
#[must_use]
pub fn parse_token_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
