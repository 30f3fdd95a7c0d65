//! Stub Server Implementation
//!
//! Accepts websocket upgrades on `/chat?token=…` and plays the chat
//! service's side of the protocol:
//!
//! ```text
//!   client                          stub
//!     │── GET /chat?token=T ──────────►│
//!     │◄──────────── info "Authenticated successfully"
//!     │── "What is X?" ───────────────►│
//!     │◄──────────── chat_response "X"
//!     │◄──────────── chat_response "X is"
//!     │◄──────────── chat_response "X is Y"
//!     │        (idle timeout)          │
//!     │◄──────────── error "Timeout: …", close
//! ```
//!
//! A missing or unaccepted token gets one `error` frame and a close.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn, Instrument};

use crate::config::{StubConfig, StubError, AUTHENTICATED_MESSAGE, IDLE_TIMEOUT_MESSAGE};
use crate::registry::{new_thread_id, ConnectionRegistry};
use crate::reply::{encode_frame, plan_reply, FrameType};

/// Path the chat endpoint is served on
pub const CHAT_PATH: &str = "/chat";

/// A bound stub chat service
pub struct StubServer {
    listener: TcpListener,
    config: Arc<StubConfig>,
    registry: ConnectionRegistry,
}

impl StubServer {
    /// Bind the listener
    ///
    /// # Errors
    ///
    /// Returns `StubError::Bind` if the address is unavailable.
    pub async fn bind(config: StubConfig) -> Result<Self, StubError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| StubError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        Ok(Self {
            listener,
            config: Arc::new(config),
            registry: ConnectionRegistry::new(),
        })
    }

    /// The bound address
    ///
    /// # Errors
    ///
    /// Returns `StubError::Io` if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, StubError> {
        Ok(self.listener.local_addr()?)
    }

    /// Base websocket endpoint clients should dial (without token)
    ///
    /// # Errors
    ///
    /// Returns `StubError::Io` if the socket cannot report its address.
    pub fn endpoint(&self) -> Result<String, StubError> {
        Ok(format!("ws://{}{CHAT_PATH}", self.local_addr()?))
    }

    /// Shared view of the authenticated connections
    #[must_use]
    pub fn registry(&self) -> ConnectionRegistry {
        self.registry.clone()
    }

    /// Serve until the task is dropped
    ///
    /// # Errors
    ///
    /// Currently never returns an error; accept failures are logged.
    pub async fn serve(self) -> Result<(), StubError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` completes
    ///
    /// Open connections are left to finish on their own.
    ///
    /// # Errors
    ///
    /// Currently never returns an error; accept failures are logged.
    pub async fn serve_with_shutdown(
        self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), StubError> {
        tokio::pin!(shutdown);
        info!(addr = ?self.listener.local_addr().ok(), "Listening for connections");

        loop {
            let (stream, peer) = tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping accept loop");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                        continue;
                    }
                },
            };

            let config = Arc::clone(&self.config);
            let registry = self.registry.clone();

            tokio::spawn(
                async move {
                    if let Err(e) = handle_connection(stream, config, registry).await {
                        debug!(error = %e, "Connection ended with error");
                    }
                }
                .instrument(tracing::info_span!("connection", %peer)),
            );
        }

        Ok(())
    }

    /// Serve on a background task
    pub fn spawn(self) -> JoinHandle<Result<(), StubError>> {
        tokio::spawn(self.serve())
    }
}

/// Read the `token` query parameter
#[must_use]
pub fn token_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
}

async fn handle_connection(
    stream: TcpStream,
    config: Arc<StubConfig>,
    registry: ConnectionRegistry,
) -> Result<(), tungstenite::Error> {
    if !config.handshake_delay.is_zero() {
        tokio::time::sleep(config.handshake_delay).await;
    }

    let mut query: Option<String> = None;

    let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        if req.uri().path() != CHAT_PATH {
            let mut not_found = ErrorResponse::new(Some("not found".to_string()));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            return Err(not_found);
        }
        query = req.uri().query().map(str::to_string);
        Ok(resp)
    })
    .await?;

    let token = query.as_deref().and_then(token_from_query).unwrap_or_default();
    let (mut sink, mut source) = ws.split();

    if !config.accepts(&token) {
        warn!("Rejecting connection with invalid token");
        sink.send(Message::Text(encode_frame(
            FrameType::Error,
            "Invalid token: not recognized",
        )))
        .await?;
        sink.close().await?;
        return Ok(());
    }

    let guard = registry.register(new_thread_id(), token);
    info!(
        thread = guard.thread_id(),
        active_connections = registry.len(),
        "Authenticated"
    );

    sink.send(Message::Text(encode_frame(
        FrameType::Info,
        AUTHENTICATED_MESSAGE,
    )))
    .await?;

    loop {
        let Ok(next) = tokio::time::timeout(config.idle_timeout, source.next()).await else {
            info!("No message within idle timeout; closing");
            sink.send(Message::Text(encode_frame(
                FrameType::Error,
                IDLE_TIMEOUT_MESSAGE,
            )))
            .await?;
            sink.close().await?;
            break;
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                debug!(len = text.len(), "Message received");
                if !respond(&config, &text, &mut sink).await? {
                    break;
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!("Client closed connection");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e),
        }
    }

    info!(thread = guard.thread_id(), "Connection finished");
    Ok(())
}

/// Send the reply to one message; `false` once the connection is closed
async fn respond<S>(config: &StubConfig, text: &str, sink: &mut S) -> Result<bool, tungstenite::Error>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let mut first = true;
    for step in plan_reply(config, text) {
        let Some(wire) = step.to_text() else {
            sink.close().await?;
            return Ok(false);
        };
        if !first && !config.chunk_delay.is_zero() {
            tokio::time::sleep(config.chunk_delay).await;
        }
        sink.send(Message::Text(wire)).await?;
        first = false;
    }
    Ok(true)
}
