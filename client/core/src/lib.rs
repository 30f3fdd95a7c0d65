//! docchat Core - Headless Chat Session Engine
//!
//! This crate holds the client side of the docchat protocol: a token-scoped
//! websocket connection to the chat service, decoding of the frames it
//! sends, and the transcript the user sees. It has no UI dependencies; a
//! surface drives it through a [`SessionHandle`] and renders the
//! [`SessionUpdate`]s it emits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Surfaces                            │
//! │        ┌──────────────┐          ┌──────────────────┐        │
//! │        │ docchat term │          │ tests / headless │        │
//! │        └──────┬───────┘          └────────┬─────────┘        │
//! │               └──────────┬────────────────┘                  │
//! │               SessionCommand (up) / SessionUpdate (down)     │
//! └──────────────────────────┼───────────────────────────────────┘
//!                            │
//! ┌──────────────────────────┼───────────────────────────────────┐
//! │                    DOCCHAT CORE                              │
//! │  ┌───────────────────────┴────────────────────────────────┐  │
//! │  │                     ChatSession                        │  │
//! │  │  ┌────────────┐ ┌──────────────┐ ┌────────┐ ┌────────┐ │  │
//! │  │  │ Connection │ │ Conversation │ │ Frame  │ │ Alerts │ │  │
//! │  │  │  Manager   │ │    State     │ │ decode │ │ Queue  │ │  │
//! │  │  └─────┬──────┘ └──────────────┘ └────────┘ └────────┘ │  │
//! │  └────────┼───────────────────────────────────────────────┘  │
//! │     ┌─────┴─────┐           ┌────────────────┐               │
//! │     │ Connector │           │ TokenProvider  │               │
//! │     └───────────┘           └────────────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use docchat_core::{
//!     load_config, ConfigOverrides, EnvTokenProvider, SessionRunner, SessionUpdate,
//!     WebSocketConnector,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config(&ConfigOverrides::new())?;
//!     let connector = Arc::new(WebSocketConnector::new(config.connect_timeout));
//!     let provider = Arc::new(EnvTokenProvider::new(config.token_env_var.clone()));
//!
//!     let mut session = SessionRunner::spawn(config, provider, connector);
//!     session.send("What is X?").await?;
//!
//!     while let Some(update) = session.recv_update().await {
//!         if let SessionUpdate::Transcript(t) = update {
//!             println!("{:?}", t.last());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`token`]: Token providers and the refresh poller
//! - [`transport`]: Connector trait, websocket connector, endpoint URIs
//! - [`connection`]: The single token-scoped connection
//! - [`frame`]: Inbound frame decoding and routing
//! - [`conversation`]: Transcript and pending-reply state
//! - [`dispatcher`]: Guards on user submissions
//! - [`alerts`]: Persistent alerts from error frames
//! - [`events`]: Connection events, commands and updates
//! - [`session`]: The session state machine and its runner
//! - [`config`]: Layered configuration
//! - [`error`]: Error types

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod alerts;
pub mod config;
pub mod connection;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod frame;
pub mod session;
pub mod token;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use alerts::{Alert, AlertId, AlertQueue};
pub use config::{load_config, load_config_from_path, ClientConfig, ConfigError, ConfigOverrides};
pub use connection::{ConnectionManager, ConnectionStatus};
pub use conversation::{ConversationState, TranscriptSnapshot, Turn, TurnRole, DEFAULT_GREETING};
pub use dispatcher::{MessageDispatcher, RejectReason, SendOutcome};
pub use error::ChatError;
pub use events::{CloseReason, ConnectionEvent, SessionCommand, SessionUpdate};
pub use frame::{decode, Frame, FrameKind};
pub use session::{ChatSession, SessionHandle, SessionId, SessionPhase, SessionRunner};
pub use token::{
    CommandTokenProvider, EnvTokenProvider, StaticTokenProvider, Token, TokenProvider,
    TokenRefresher,
};
pub use transport::{ConnectionId, Connector, WebSocketConnector};
