//! Connection Manager
//!
//! Owns at most one connection, scoped to the token it was opened with.
//!
//! # Lifecycle
//!
//! ```text
//!            connect(token)           Opened
//!  Closed ──────────────────► Connecting ──────► Open
//!    ▲                            │               │
//!    └────────── Closed / close() ┴───────────────┘
//! ```
//!
//! `connect` always closes the previous connection before dialing the new
//! one, so two connections never coexist. Events are tagged with a
//! [`ConnectionId`]; anything reported by a connection this manager no
//! longer owns is dropped in [`ConnectionManager::observe`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ChatError;
use crate::events::{CloseReason, ConnectionEvent};
use crate::token::Token;
use crate::transport::{endpoint, ConnectionHandle, ConnectionId, Connector};

/// Observable state of the managed connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Dial or handshake in progress
    Connecting,
    /// Ready for sending
    Open,
    /// No usable connection
    Closed,
}

impl ConnectionStatus {
    /// Whether messages may be sent
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// What an event from the current connection means for the session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionUpdate {
    /// The connection is now open
    Opened,
    /// A raw inbound message
    Message(String),
    /// The connection is gone
    Closed(CloseReason),
}

/// Owns the single connection of a session
pub struct ConnectionManager {
    endpoint: String,
    connector: Arc<dyn Connector>,
    events: mpsc::Sender<ConnectionEvent>,
    current: Option<ConnectionHandle>,
    token: Option<Token>,
    status: ConnectionStatus,
}

impl ConnectionManager {
    /// Manager dialing `endpoint` through `connector`
    ///
    /// Connection tasks report on `events`; the owner feeds what it
    /// receives there back through [`observe`](Self::observe).
    pub fn new(
        endpoint: impl Into<String>,
        connector: Arc<dyn Connector>,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            connector,
            events,
            current: None,
            token: None,
            status: ConnectionStatus::Closed,
        }
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Id of the connection being managed, if any
    #[must_use]
    pub fn current_id(&self) -> Option<ConnectionId> {
        self.current.as_ref().map(ConnectionHandle::id)
    }

    /// Token of the most recent `connect`
    ///
    /// Kept after the connection closes so the owner can tell a refreshed
    /// token from a re-announced one.
    #[must_use]
    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// Close any existing connection and dial a new one with `token`
    ///
    /// # Errors
    ///
    /// Returns `ChatError::InvalidEndpoint` if the configured endpoint cannot
    /// carry a token. The existing connection is left untouched in that case.
    pub fn connect(&mut self, token: Token) -> Result<ConnectionId, ChatError> {
        let uri = endpoint::endpoint_uri(&self.endpoint, &token)?;

        self.close();

        let id = ConnectionId::next();
        tracing::info!(%id, endpoint = %endpoint::redact(&uri), "Connecting");

        let handle = self.connector.connect(id, uri, self.events.clone());
        self.current = Some(handle);
        self.token = Some(token);
        self.status = ConnectionStatus::Connecting;

        Ok(id)
    }

    /// Close the current connection
    ///
    /// Returns whether there was one. Safe to call in any state.
    pub fn close(&mut self) -> bool {
        self.status = ConnectionStatus::Closed;
        match self.current.take() {
            Some(handle) => {
                tracing::info!(id = %handle.id(), "Closing connection");
                handle.close();
                true
            }
            None => false,
        }
    }

    /// Forget the token so the next `connect` counts as fresh
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Write one text message on the open connection
    ///
    /// # Errors
    ///
    /// Returns `ChatError::NotConnected` unless the status is `Open`, or
    /// `ChatError::SendFailed` if the connection task has exited.
    pub fn send(&self, text: &str) -> Result<(), ChatError> {
        match (&self.current, self.status) {
            (Some(handle), ConnectionStatus::Open) => handle.send_text(text),
            _ => Err(ChatError::NotConnected),
        }
    }

    /// Apply an event reported by a connection task
    ///
    /// Returns `None` for events from connections this manager no longer
    /// owns.
    pub fn observe(&mut self, event: ConnectionEvent) -> Option<ConnectionUpdate> {
        let id = event.connection_id();
        if self.current_id() != Some(id) {
            tracing::debug!(%id, "Dropping event from stale connection");
            return None;
        }

        match event {
            ConnectionEvent::Opened { .. } => {
                tracing::info!(%id, "Connection open");
                self.status = ConnectionStatus::Open;
                Some(ConnectionUpdate::Opened)
            }
            ConnectionEvent::Message { text, .. } => Some(ConnectionUpdate::Message(text)),
            ConnectionEvent::Closed { reason, .. } => {
                tracing::info!(%id, ?reason, "Connection closed");
                self.current = None;
                self.status = ConnectionStatus::Closed;
                Some(ConnectionUpdate::Closed(reason))
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}
