//! Error Types
//!
//! Failures of the session core. Most protocol-level problems (malformed
//! frames, unsolicited responses, dropped connections) are recovered inside
//! the session and never surface here; these errors cover the calls that a
//! surface makes directly.

use std::time::Duration;

use thiserror::Error;

use crate::token::TokenError;

/// Errors returned by the session core
#[derive(Debug, Error)]
pub enum ChatError {
    /// No open connection to write to
    #[error("not connected")]
    NotConnected,

    /// The websocket dial or handshake failed
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The websocket dial did not complete in time
    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Writing to the connection failed
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The underlying transport reported an error mid-connection
    #[error("transport error: {0}")]
    Transport(String),

    /// The configured endpoint cannot carry a token
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Token acquisition failed
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The session loop is no longer running
    #[error("session closed")]
    SessionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChatError::ConnectFailed("refused".to_string());
        assert!(err.to_string().contains("refused"));

        let err = ChatError::ConnectTimeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));

        assert_eq!(ChatError::NotConnected.to_string(), "not connected");
    }
}
