//! Chat Session
//!
//! One authenticated chat view: a connection, its conversation, and the
//! alerts raised along the way.
//!
//! # Design Philosophy
//!
//! [`ChatSession`] is a plain state machine. It never awaits; every input
//! (a token change, a connection event, a user command) is applied by one
//! method call, and every visible change is pushed out as a
//! [`SessionUpdate`]. [`SessionRunner`] drives it from a single tokio task
//! that is the only consumer of all three inputs, which gives events a
//! total order without any locking.
//!
//! ```text
//!  TokenRefresher ──watch──┐
//!  connection tasks ─mpsc──┼──► session loop ──updates──► surface
//!  SessionHandle ───mpsc───┘
//! ```
//!
//! # Phases
//!
//! ```text
//! NoToken ─token─► Connecting ─open─► Open ─close─► Closed ─new token─► Connecting
//!                                   any ─teardown─► TornDown
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::alerts::{AlertId, AlertQueue};
use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionStatus, ConnectionUpdate};
use crate::conversation::ConversationState;
use crate::dispatcher::{MessageDispatcher, RejectReason, SendOutcome};
use crate::error::ChatError;
use crate::events::{ConnectionEvent, SessionCommand, SessionUpdate};
use crate::frame::{self, FrameRoute};
use crate::token::{Token, TokenProvider, TokenRefresher};
use crate::transport::Connector;

/// Unique session identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle phase of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No token; no connection is attempted
    NoToken,
    /// Dialing with the current token
    Connecting,
    /// Connected; messages may be sent
    Open,
    /// Connection lost; waiting for a token refresh
    Closed,
    /// Session ended; terminal
    TornDown,
}

impl SessionPhase {
    /// Whether the session has ended
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TornDown)
    }
}

/// The session state machine
pub struct ChatSession {
    id: SessionId,
    phase: SessionPhase,
    connection: ConnectionManager,
    conversation: ConversationState,
    alerts: AlertQueue,
    updates: mpsc::Sender<SessionUpdate>,
}

impl ChatSession {
    /// Create a session with no token yet
    ///
    /// Connection tasks report on `events`; feed what arrives there to
    /// [`handle_connection_event`](Self::handle_connection_event).
    ///
    /// `updates` is bounded and never awaited. When it is full the update
    /// is dropped with a warning; every transcript update is a full
    /// snapshot, so the next one carries what was lost.
    pub fn new(
        config: &ClientConfig,
        connector: Arc<dyn Connector>,
        events: mpsc::Sender<ConnectionEvent>,
        updates: mpsc::Sender<SessionUpdate>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            phase: SessionPhase::NoToken,
            connection: ConnectionManager::new(config.websocket_uri.clone(), connector, events),
            conversation: ConversationState::new(config.greeting.clone()),
            alerts: AlertQueue::new(),
            updates,
        }
    }

    /// Session id
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Status of the managed connection
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// The conversation
    #[must_use]
    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    /// Active alerts
    #[must_use]
    pub fn alerts(&self) -> &AlertQueue {
        &self.alerts
    }

    /// Whether a submission would be accepted right now (ignoring its text)
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.phase == SessionPhase::Open && !self.conversation.is_pending()
    }

    /// Emit the current phase and transcript
    pub fn publish_state(&self) {
        self.emit(SessionUpdate::Phase(self.phase));
        self.emit(SessionUpdate::Transcript(self.conversation.snapshot()));
    }

    /// React to the token provider's current value
    ///
    /// A new token replaces the connection; an absent token closes it. The
    /// token the live connection already uses is ignored.
    pub fn token_changed(&mut self, token: Option<Token>) {
        if self.phase.is_terminal() {
            return;
        }

        let Some(token) = token else {
            if self.connection.close() {
                tracing::info!("Token withdrawn; connection closed");
            }
            self.connection.clear_token();
            self.set_phase(SessionPhase::NoToken);
            return;
        };

        if self.connection.token() == Some(&token)
            && self.connection.status() != ConnectionStatus::Closed
        {
            tracing::debug!("Token unchanged; keeping connection");
            return;
        }

        match self.connection.connect(token) {
            Ok(_) => self.set_phase(SessionPhase::Connecting),
            Err(e) => {
                tracing::error!(error = %e, "Cannot connect");
                self.connection.close();
                self.set_phase(SessionPhase::Closed);
            }
        }
    }

    /// Apply one event from a connection task
    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        if self.phase.is_terminal() {
            return;
        }

        let Some(update) = self.connection.observe(event) else {
            return;
        };

        match update {
            ConnectionUpdate::Opened => {
                if self.conversation.abandon_pending() {
                    tracing::info!("Reply to the previous message was lost with its connection");
                    self.emit(SessionUpdate::Transcript(self.conversation.snapshot()));
                }
                self.set_phase(SessionPhase::Open);
            }
            ConnectionUpdate::Message(raw) => self.route_frame(&raw),
            ConnectionUpdate::Closed(reason) => {
                if self.conversation.is_pending() {
                    tracing::warn!(?reason, "Connection closed with a reply outstanding");
                }
                self.set_phase(SessionPhase::Closed);
            }
        }
    }

    fn route_frame(&mut self, raw: &str) {
        let frame = frame::decode(raw);
        tracing::debug!(kind = frame.kind.as_str(), "Frame received");

        match frame.route() {
            FrameRoute::Transcript(content) => {
                let outcome = self.conversation.apply_response(content);
                tracing::debug!(?outcome, "Response applied");
                self.emit(SessionUpdate::Transcript(self.conversation.snapshot()));
            }
            FrameRoute::Alert(text) => {
                let alert = self.alerts.raise(text);
                tracing::warn!(alert = %alert.id, text = %alert.text, "Service reported an error");
                self.emit(SessionUpdate::Alert(alert));
            }
            FrameRoute::Diagnostic(text) => {
                tracing::info!(content = %text, "Service info");
            }
        }
    }

    /// Submit a user message
    pub fn send(&mut self, text: &str) -> SendOutcome {
        if self.phase.is_terminal() {
            return SendOutcome::Rejected(RejectReason::NotOpen);
        }

        let outcome = MessageDispatcher::new(&self.connection, &mut self.conversation).send(text);
        if outcome.is_sent() {
            self.emit(SessionUpdate::Transcript(self.conversation.snapshot()));
        }
        outcome
    }

    /// Dismiss an alert; returns whether it was active
    pub fn dismiss_alert(&mut self, id: AlertId) -> bool {
        if self.alerts.dismiss(id).is_some() {
            self.emit(SessionUpdate::AlertDismissed(id));
            true
        } else {
            false
        }
    }

    /// Close the connection and end the session
    pub fn teardown(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        self.connection.close();
        self.set_phase(SessionPhase::TornDown);
        tracing::info!("Session torn down");
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            tracing::debug!(from = ?self.phase, to = ?phase, "Phase change");
            self.phase = phase;
            self.emit(SessionUpdate::Phase(phase));
        }
    }

    fn emit(&self, update: SessionUpdate) {
        match self.updates.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Surface is not draining session updates; update dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!("No surface listening for session updates");
            }
        }
    }
}

// =============================================================================
// Session Runner
// =============================================================================

/// Runs a [`ChatSession`] on its own task
pub struct SessionRunner;

impl SessionRunner {
    /// Start a session fed by `provider`, dialing through `connector`
    ///
    /// The provider is polled every `config.token_refresh_interval`; the
    /// poller stops with the session.
    pub fn spawn(
        config: ClientConfig,
        provider: Arc<dyn TokenProvider>,
        connector: Arc<dyn Connector>,
    ) -> SessionHandle {
        let (tokens, refresher) =
            TokenRefresher::new(provider, config.token_refresh_interval).spawn();
        Self::start(&config, tokens, connector, Some(refresher))
    }

    /// Start a session fed by an existing token channel
    pub fn spawn_with_tokens(
        config: ClientConfig,
        tokens: watch::Receiver<Option<Token>>,
        connector: Arc<dyn Connector>,
    ) -> SessionHandle {
        Self::start(&config, tokens, connector, None)
    }

    fn start(
        config: &ClientConfig,
        tokens: watch::Receiver<Option<Token>>,
        connector: Arc<dyn Connector>,
        refresher: Option<JoinHandle<()>>,
    ) -> SessionHandle {
        let capacity = config.channel_capacity.max(1);
        let (events_tx, events_rx) = mpsc::channel(capacity);
        let (commands_tx, commands_rx) = mpsc::channel(capacity);
        let (updates_tx, updates_rx) = mpsc::channel(capacity);

        let session = ChatSession::new(config, connector, events_tx, updates_tx);
        let id = session.id();
        let span = tracing::info_span!("session", %id);

        let task = tokio::spawn(
            run_session(session, tokens, commands_rx, events_rx, refresher).instrument(span),
        );

        SessionHandle {
            id,
            commands: commands_tx,
            updates: updates_rx,
            task,
        }
    }
}

async fn run_session(
    mut session: ChatSession,
    mut tokens: watch::Receiver<Option<Token>>,
    mut commands: mpsc::Receiver<SessionCommand>,
    mut events: mpsc::Receiver<ConnectionEvent>,
    refresher: Option<JoinHandle<()>>,
) {
    tracing::info!("Session started");
    session.publish_state();

    let initial = tokens.borrow_and_update().clone();
    session.token_changed(initial);

    let mut tokens_open = true;

    loop {
        tokio::select! {
            changed = tokens.changed(), if tokens_open => match changed {
                Ok(()) => {
                    let token = tokens.borrow_and_update().clone();
                    session.token_changed(token);
                }
                Err(_) => {
                    tracing::debug!("Token source ended; keeping current connection");
                    tokens_open = false;
                }
            },

            command = commands.recv() => match command {
                Some(SessionCommand::Send { text, reply }) => {
                    let outcome = session.send(&text);
                    if let Some(reply) = reply {
                        // The caller may have stopped waiting
                        let _ = reply.send(outcome);
                    }
                }
                Some(SessionCommand::DismissAlert(id)) => {
                    session.dismiss_alert(id);
                }
                Some(SessionCommand::Teardown) | None => break,
            },

            Some(event) = events.recv() => session.handle_connection_event(event),
        }
    }

    session.teardown();
    if let Some(refresher) = refresher {
        refresher.abort();
    }
}

/// Surface-side handle to a running session
///
/// Dropping the handle ends the session and closes its connection.
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::Sender<SessionCommand>,
    updates: mpsc::Receiver<SessionUpdate>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Session id
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Submit a user message and wait for the dispatcher's decision
    ///
    /// # Errors
    ///
    /// Returns `ChatError::SessionClosed` if the session loop has ended.
    pub async fn send(&self, text: impl Into<String>) -> Result<SendOutcome, ChatError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(SessionCommand::Send {
                text: text.into(),
                reply: Some(reply),
            })
            .await
            .map_err(|_| ChatError::SessionClosed)?;
        outcome.await.map_err(|_| ChatError::SessionClosed)
    }

    /// Dismiss an alert
    ///
    /// # Errors
    ///
    /// Returns `ChatError::SessionClosed` if the session loop has ended.
    pub async fn dismiss_alert(&self, id: AlertId) -> Result<(), ChatError> {
        self.commands
            .send(SessionCommand::DismissAlert(id))
            .await
            .map_err(|_| ChatError::SessionClosed)
    }

    /// Wait for the next update; `None` once the session has ended
    ///
    /// Holds at most `channel_capacity` updates; drain it steadily.
    pub async fn recv_update(&mut self) -> Option<SessionUpdate> {
        self.updates.recv().await
    }

    /// Next update if one is queued
    pub fn try_recv_update(&mut self) -> Option<SessionUpdate> {
        self.updates.try_recv().ok()
    }

    /// Whether the session loop has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// End the session and wait for its connection to be released
    pub async fn teardown(self) {
        // Already gone if the loop ended on its own
        let _ = self.commands.send(SessionCommand::Teardown).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Session task failed");
        }
    }
}
