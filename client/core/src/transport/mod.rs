//! Transport Layer
//!
//! Opens the socket a session talks through. The session never dials
//! directly: it asks a [`Connector`] for a connection and gets back a
//! [`ConnectionHandle`] for writing, while everything the connection reports
//! arrives as [`ConnectionEvent`]s on the session's event channel.
//!
//! # Design Philosophy
//!
//! Keeping the dial behind a trait lets the session state machine run
//! against an in-memory connector in tests and against
//! [`WebSocketConnector`] in production, with identical event ordering:
//! `Opened`, then any number of `Message`s, then exactly one `Closed`.

pub mod endpoint;
pub mod websocket;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use url::Url;

use crate::error::ChatError;
use crate::events::ConnectionEvent;

pub use endpoint::{endpoint_uri, redact};
pub use websocket::WebSocketConnector;

/// Identifier of one connection attempt
///
/// Ids increase monotonically within a process; the connection manager uses
/// them to discard events from connections it has already replaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Allocate the next connection id
    #[must_use]
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Instructions from the session to a connection task
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Write one text message
    Text(String),
    /// Close the connection gracefully
    Close,
}

/// Write side of an established (or establishing) connection
///
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: bool,
}

impl ConnectionHandle {
    /// Wrap the outbound channel of a connection task
    pub fn new(id: ConnectionId, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            outbound,
            closed: false,
        }
    }

    /// The connection id
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue one text message for the connection task
    ///
    /// # Errors
    ///
    /// Returns `ChatError::SendFailed` if the connection task has exited.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ChatError> {
        if self.closed {
            return Err(ChatError::NotConnected);
        }
        self.outbound
            .send(Outbound::Text(text.into()))
            .map_err(|_| ChatError::SendFailed(format!("{} is no longer running", self.id)))
    }

    /// Close the connection
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            // The task may already be gone; nothing left to close then
            let _ = self.outbound.send(Outbound::Close);
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Opens connections on behalf of the session
pub trait Connector: Send + Sync {
    /// Start connecting to `uri`
    ///
    /// Must return immediately. Progress is reported on `events`, every
    /// event tagged with `id`, ending with exactly one
    /// [`ConnectionEvent::Closed`].
    fn connect(
        &self,
        id: ConnectionId,
        uri: Url,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> ConnectionHandle;
}
