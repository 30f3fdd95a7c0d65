//! WebSocket Connector
//!
//! Production [`Connector`] built on `tokio-tungstenite`. Each connection
//! runs in one spawned task that owns the socket:
//!
//! ```text
//!   session ──Outbound──► connection task ──text frame──► service
//!   session ◄─ConnectionEvent── connection task ◄─frames── service
//! ```
//!
//! The task reports `Opened` once the handshake completes, forwards every
//! text message verbatim (decoding is the session's job), and always ends by
//! reporting `Closed` with the reason. Closing the handle before the
//! handshake completes abandons the dial without ever reporting `Opened`.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::Instrument;
use url::Url;

use super::{endpoint, ConnectionHandle, ConnectionId, Connector, Outbound};
use crate::error::ChatError;
use crate::events::{CloseReason, ConnectionEvent};

/// Dials the chat service over websocket
#[derive(Clone, Debug)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    /// Connector giving up on a dial after `connect_timeout`
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// The dial timeout
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl Connector for WebSocketConnector {
    fn connect(
        &self,
        id: ConnectionId,
        uri: Url,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> ConnectionHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let span = tracing::info_span!("connection", %id, endpoint = %endpoint::redact(&uri));

        tokio::spawn(
            run_connection(id, uri, self.connect_timeout, events, outbound_rx).instrument(span),
        );

        ConnectionHandle::new(id, outbound_tx)
    }
}

async fn run_connection(
    id: ConnectionId,
    uri: Url,
    connect_timeout: Duration,
    events: mpsc::Sender<ConnectionEvent>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let reason = match drive(id, &uri, connect_timeout, &events, outbound).await {
        Ok(reason) => reason,
        Err(ChatError::ConnectTimeout(_)) => CloseReason::ConnectTimeout,
        Err(ChatError::ConnectFailed(e)) => CloseReason::ConnectFailed(e),
        Err(e) => CloseReason::TransportError(e.to_string()),
    };

    tracing::info!(?reason, "Connection ended");

    // The session may be gone already (teardown); nobody left to tell
    let _ = events.send(ConnectionEvent::Closed { id, reason }).await;
}

async fn drive(
    id: ConnectionId,
    uri: &Url,
    connect_timeout: Duration,
    events: &mpsc::Sender<ConnectionEvent>,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) -> Result<CloseReason, ChatError> {
    let handshake =
        tokio::time::timeout(connect_timeout, tokio_tungstenite::connect_async(uri.as_str()));
    tokio::pin!(handshake);

    // A close while dialing drops the half-open socket
    let mut stream = loop {
        tokio::select! {
            dialed = &mut handshake => {
                let (stream, _response) = dialed
                    .map_err(|_| ChatError::ConnectTimeout(connect_timeout))?
                    .map_err(|e| ChatError::ConnectFailed(e.to_string()))?;
                break stream;
            }

            command = outbound.recv() => match command {
                Some(Outbound::Text(_)) => {
                    tracing::warn!("Dropping message queued before the connection opened");
                }
                Some(Outbound::Close) | None => {
                    tracing::debug!("Closed while dialing; handshake abandoned");
                    return Ok(CloseReason::Local);
                }
            },
        }
    };

    tracing::debug!("WebSocket handshake complete");

    if events.send(ConnectionEvent::Opened { id }).await.is_err() {
        if let Err(e) = stream.close(None).await {
            tracing::debug!(error = %e, "Close handshake failed");
        }
        return Ok(CloseReason::Local);
    }

    let (mut sink, mut stream) = stream.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    sink.send(Message::Text(text))
                        .await
                        .map_err(|e| ChatError::SendFailed(e.to_string()))?;
                }
                Some(Outbound::Close) | None => {
                    if let Err(e) = sink.close().await {
                        tracing::debug!(error = %e, "Close handshake failed");
                    }
                    return Ok(CloseReason::Local);
                }
            },

            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if events.send(ConnectionEvent::Message { id, text }).await.is_err() {
                        return Ok(CloseReason::Local);
                    }
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                    Ok(text) => {
                        if events.send(ConnectionEvent::Message { id, text }).await.is_err() {
                            return Ok(CloseReason::Local);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.to_string()))
                        .unwrap_or((None, String::new()));
                    return Ok(CloseReason::Remote { code, reason });
                }
                // Ping/pong are answered by tungstenite itself
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(ChatError::Transport(e.to_string())),
                None => {
                    return Ok(CloseReason::Remote {
                        code: None,
                        reason: String::new(),
                    })
                }
            },
        }
    }
}
