//! Session Events
//!
//! Everything that flows through the session loop is one of three kinds:
//!
//! - [`ConnectionEvent`]: reported by connection tasks (open, message, close)
//! - [`SessionCommand`]: issued by a surface (send, dismiss, teardown)
//! - [`SessionUpdate`]: emitted by the session for surfaces to render
//!
//! Connection tasks never touch session state; they only forward tagged
//! events, and the session applies them one at a time.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::alerts::{Alert, AlertId};
use crate::conversation::TranscriptSnapshot;
use crate::dispatcher::SendOutcome;
use crate::session::SessionPhase;
use crate::transport::ConnectionId;

/// Why a connection ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// Closed by this client (token change, teardown)
    Local,
    /// The service sent a close frame or the stream ended
    Remote {
        /// Close code, if the service sent one
        code: Option<u16>,
        /// Close reason text (may be empty)
        reason: String,
    },
    /// The dial or handshake failed
    ConnectFailed(String),
    /// The dial did not finish within the connect timeout
    ConnectTimeout,
    /// A read or write error ended the connection
    TransportError(String),
}

impl CloseReason {
    /// Whether the close was requested by this client
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

/// Lifecycle and data events from a connection task
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The websocket handshake completed
    Opened {
        /// Connection the event belongs to
        id: ConnectionId,
    },
    /// A text message arrived
    Message {
        /// Connection the event belongs to
        id: ConnectionId,
        /// Raw message text, not yet decoded
        text: String,
    },
    /// The connection is gone
    Closed {
        /// Connection the event belongs to
        id: ConnectionId,
        /// Why it ended
        reason: CloseReason,
    },
}

impl ConnectionEvent {
    /// The connection this event is tagged with
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            Self::Opened { id } | Self::Message { id, .. } | Self::Closed { id, .. } => *id,
        }
    }
}

/// Requests from a surface to the session loop
#[derive(Debug)]
pub enum SessionCommand {
    /// Submit a user message
    Send {
        /// Text as typed
        text: String,
        /// Where to report the dispatcher's decision
        reply: Option<oneshot::Sender<SendOutcome>>,
    },
    /// Dismiss a persistent alert
    DismissAlert(AlertId),
    /// End the session and close the connection
    Teardown,
}

/// State changes surfaces should render
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The session moved to a new lifecycle phase
    Phase(SessionPhase),
    /// The transcript or pending flag changed
    Transcript(TranscriptSnapshot),
    /// An error frame raised a persistent alert
    Alert(Alert),
    /// An alert was dismissed
    AlertDismissed(AlertId),
}
