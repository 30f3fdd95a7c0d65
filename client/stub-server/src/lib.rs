//! docchat Stub Server
//!
//! A local stand-in for the docchat chat service. It speaks the same
//! websocket frame protocol, authorizes connections by a `token` query
//! parameter, streams answers as cumulative `chat_response` snapshots and
//! closes idle connections, so the client core can be exercised end to end
//! without the real service.
//!
//! # Example
//!
//! ```ignore
//! use docchat_stub_server::{StubConfig, StubServer};
//!
//! let config = StubConfig::default().with_reply("What is X?", "X is Y");
//! let server = StubServer::bind(config).await?;
//! let endpoint = server.endpoint()?;
//! let registry = server.registry();
//! let task = server.spawn();
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod registry;
pub mod reply;
pub mod server;

pub use config::{StubConfig, StubError, AUTHENTICATED_MESSAGE, IDLE_TIMEOUT_MESSAGE};
pub use registry::ConnectionRegistry;
pub use reply::{encode_frame, FrameType};
pub use server::{token_from_query, StubServer, CHAT_PATH};
