//! Client Configuration
//!
//! Configuration for a chat session, loaded from an optional TOML file at
//! `$XDG_CONFIG_HOME/docchat/client.toml`.
//!
//! # Configuration Priority
//!
//! Values are applied with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [connection]
//! websocket_uri = "wss://chat.example.com/chat"
//! connect_timeout_ms = 5000
//! channel_capacity = 64
//!
//! [conversation]
//! greeting = "Hello, how can I help?"
//!
//! [token]
//! refresh_interval_secs = 30
//! env_var = "DOCCHAT_TOKEN"
//! command = "my-idp print-token"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::conversation::DEFAULT_GREETING;
use crate::token::EnvTokenProvider;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the highest-priority configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[connection]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionToml {
    /// Base websocket endpoint (without token)
    pub websocket_uri: Option<String>,

    /// Dial timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Capacity of the session's event and command channels
    pub channel_capacity: Option<usize>,
}

/// `[conversation]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationToml {
    /// Agent greeting shown as the first turn
    pub greeting: Option<String>,
}

/// `[token]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenToml {
    /// How often to ask the token provider for a fresh token
    pub refresh_interval_secs: Option<u64>,

    /// Environment variable holding the token
    pub env_var: Option<String>,

    /// Shell command printing the token on stdout
    pub command: Option<String>,
}

/// Root of the TOML configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Connection settings
    pub connection: ConnectionToml,

    /// Conversation settings
    pub conversation: ConversationToml,

    /// Token acquisition settings
    pub token: TokenToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base websocket endpoint; the token is added as a query parameter
    pub websocket_uri: String,

    /// How long a dial may take before it counts as failed
    pub connect_timeout: Duration,

    /// Capacity of the session's event and command channels
    pub channel_capacity: usize,

    /// Agent greeting at transcript index 0
    pub greeting: String,

    /// Token provider polling interval
    pub token_refresh_interval: Duration,

    /// Environment variable read by the env token provider
    pub token_env_var: String,

    /// Command run by the command token provider, if configured
    pub token_command: Option<String>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            websocket_uri: "ws://127.0.0.1:8080/chat".to_string(),
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 64,
            greeting: DEFAULT_GREETING.to_string(),
            token_refresh_interval: Duration::from_secs(30),
            token_env_var: EnvTokenProvider::DEFAULT_VAR.to_string(),
            token_command: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the highest-priority value came from
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check that the configuration can drive a session
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for a non-websocket endpoint or
    /// a zero capacity, timeout or refresh interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.websocket_uri).map_err(|e| {
            ConfigError::ValidationError(format!("websocket_uri `{}`: {e}", self.websocket_uri))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::ValidationError(format!(
                "websocket_uri `{}` must use ws:// or wss://",
                self.websocket_uri
            )));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "channel_capacity must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "connect_timeout must be greater than 0".to_string(),
            ));
        }
        if self.token_refresh_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "token refresh interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Default config file location (`$XDG_CONFIG_HOME/docchat/client.toml`)
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("docchat").join("client.toml"))
}

/// Load configuration from the default path, the environment and `overrides`
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed,
/// or if the result fails validation.
pub fn load_config(overrides: &ConfigOverrides) -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path(), overrides)
}

/// Load configuration from `path` (if it exists), the environment and `overrides`
///
/// Validation runs once every layer is applied, so a CLI value can replace
/// a bad file or environment value.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// the result fails validation.
pub fn load_config_from_path(
    path: Option<PathBuf>,
    overrides: &ConfigOverrides,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);
    overrides.apply(&mut config);
    config.validate()?;

    Ok(config)
}

/// Apply values present in a parsed TOML file
pub fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    if let Some(ref uri) = toml.connection.websocket_uri {
        config.websocket_uri = uri.clone();
    }
    if let Some(ms) = toml.connection.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(capacity) = toml.connection.channel_capacity {
        config.channel_capacity = capacity;
    }

    if let Some(ref greeting) = toml.conversation.greeting {
        config.greeting = greeting.clone();
    }

    if let Some(secs) = toml.token.refresh_interval_secs {
        config.token_refresh_interval = Duration::from_secs(secs);
    }
    if let Some(ref var) = toml.token.env_var {
        config.token_env_var = var.clone();
    }
    if toml.token.command.is_some() {
        config.token_command = toml.token.command.clone();
    }
}

fn apply_env_config(config: &mut ClientConfig) {
    apply_env_config_from(config, |key| std::env::var(key).ok());
}

/// Apply environment overrides read through `lookup`
///
/// Unparseable numeric values are ignored with a warning.
pub fn apply_env_config_from(config: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(uri) = lookup("DOCCHAT_WEBSOCKET_URI") {
        config.websocket_uri = uri;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = lookup("DOCCHAT_CONNECT_TIMEOUT") {
        match timeout.parse::<u64>() {
            Ok(ms) => {
                config.connect_timeout = Duration::from_millis(ms);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %timeout, "Ignoring invalid DOCCHAT_CONNECT_TIMEOUT"),
        }
    }
    if let Some(greeting) = lookup("DOCCHAT_GREETING") {
        config.greeting = greeting;
        config.source = ConfigSource::Env;
    }
    if let Some(interval) = lookup("DOCCHAT_TOKEN_REFRESH_SECS") {
        match interval.parse::<u64>() {
            Ok(secs) => {
                config.token_refresh_interval = Duration::from_secs(secs);
                config.source = ConfigSource::Env;
            }
            Err(_) => {
                tracing::warn!(value = %interval, "Ignoring invalid DOCCHAT_TOKEN_REFRESH_SECS");
            }
        }
    }
    if let Some(command) = lookup("DOCCHAT_TOKEN_COMMAND") {
        config.token_command = Some(command);
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides, applied last
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Websocket endpoint override
    pub websocket_uri: Option<String>,

    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,

    /// Greeting override
    pub greeting: Option<String>,

    /// Token refresh interval override (seconds)
    pub token_refresh_secs: Option<u64>,

    /// Token command override
    pub token_command: Option<String>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set websocket endpoint override
    #[must_use]
    pub fn with_websocket_uri(mut self, uri: impl Into<String>) -> Self {
        self.websocket_uri = Some(uri.into());
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Set greeting override
    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.websocket_uri.is_none()
            && self.connect_timeout_ms.is_none()
            && self.greeting.is_none()
            && self.token_refresh_secs.is_none()
            && self.token_command.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref uri) = self.websocket_uri {
            config.websocket_uri = uri.clone();
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ref greeting) = self.greeting {
            config.greeting = greeting.clone();
        }
        if let Some(secs) = self.token_refresh_secs {
            config.token_refresh_interval = Duration::from_secs(secs);
        }
        if self.token_command.is_some() {
            config.token_command = self.token_command.clone();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
