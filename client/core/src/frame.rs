//! Frame Decoding
//!
//! Every inbound websocket message is a JSON object:
//!
//! ```text
//! { "message_type": "info" | "chat_response" | "error", "content": "..." }
//! ```
//!
//! Decoding is total. Unknown or missing `message_type` values decode as
//! [`FrameKind::Info`], a missing `content` decodes as the empty string, and
//! payloads that are not frame-shaped JSON at all are reported as a
//! diagnostic and also become `Info`. Nothing a service sends can make
//! decoding fail in a way the session has to handle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a raw payload is not a frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Not valid JSON
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    /// Valid JSON, but not an object with string fields
    #[error("unexpected frame shape: {0}")]
    InvalidShape(String),
}

/// Frame discriminant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Service status; diagnostic only
    Info,
    /// The reply to the pending user message
    ChatResponse,
    /// A service-side failure the user should see
    Error,
}

impl FrameKind {
    /// Wire name of this kind
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::ChatResponse => "chat_response",
            Self::Error => "error",
        }
    }
}

/// A decoded inbound frame
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// What the frame is
    #[serde(rename = "message_type")]
    pub kind: FrameKind,
    /// Payload text
    pub content: String,
}

/// Where the session should send a decoded frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameRoute {
    /// Replace the pending reply with this content
    Transcript(String),
    /// Raise a persistent alert with this text
    Alert(String),
    /// Log only
    Diagnostic(String),
}

impl Frame {
    /// Construct a frame
    pub fn new(kind: FrameKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// Consume the frame into its routing decision
    #[must_use]
    pub fn route(self) -> FrameRoute {
        match self.kind {
            FrameKind::ChatResponse => FrameRoute::Transcript(self.content),
            FrameKind::Error => FrameRoute::Alert(self.content),
            FrameKind::Info => FrameRoute::Diagnostic(self.content),
        }
    }
}

/// Wire representation, before unknown tags are folded into `Info`
#[derive(Deserialize)]
struct WireFrame {
    #[serde(default)]
    message_type: Option<WireKind>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireKind {
    Info,
    ChatResponse,
    Error,
    #[serde(other)]
    Unrecognized,
}

/// Decode a raw payload, reporting why it is not a frame
///
/// # Errors
///
/// Returns `FrameError::InvalidJson` for unparseable text and
/// `FrameError::InvalidShape` for JSON that is not a frame object.
pub fn try_decode(raw: &str) -> Result<Frame, FrameError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| FrameError::InvalidJson(e.to_string()))?;

    if !value.is_object() {
        return Err(FrameError::InvalidShape("expected a JSON object".to_string()));
    }

    let wire: WireFrame =
        serde_json::from_value(value).map_err(|e| FrameError::InvalidShape(e.to_string()))?;

    let kind = match wire.message_type {
        Some(WireKind::ChatResponse) => FrameKind::ChatResponse,
        Some(WireKind::Error) => FrameKind::Error,
        Some(WireKind::Info) => FrameKind::Info,
        Some(WireKind::Unrecognized) => {
            tracing::debug!("Unrecognized message_type; treating frame as info");
            FrameKind::Info
        }
        None => {
            tracing::debug!("Frame without message_type; treating as info");
            FrameKind::Info
        }
    };

    Ok(Frame {
        kind,
        content: wire.content.unwrap_or_default(),
    })
}

/// Decode a raw payload; malformed payloads become `Info` frames
///
/// The returned frame for a malformed payload carries the raw text as its
/// content so the diagnostic sink can show what arrived.
#[must_use]
pub fn decode(raw: &str) -> Frame {
    match try_decode(raw) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, len = raw.len(), "Malformed frame");
            Frame::new(FrameKind::Info, raw)
        }
    }
}
