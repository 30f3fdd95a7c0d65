//! What the stub says back
//!
//! A user message is either a test directive or a question. Directives let
//! tests provoke specific frames:
//!
//! | Message | Effect |
//! |---|---|
//! | `/error <text>` | one `error` frame |
//! | `/info <text>` | one `info` frame |
//! | `/raw <payload>` | `<payload>` sent verbatim |
//! | `/close` | close the connection |
//!
//! Anything else is answered with `chat_response` frames, each carrying
//! the answer so far, one word longer than the previous.

use serde::Serialize;

use crate::config::StubConfig;

/// Frame discriminant on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    /// Status
    Info,
    /// Answer snapshot
    ChatResponse,
    /// Failure
    Error,
}

#[derive(Serialize)]
struct WireFrame<'a> {
    message_type: FrameType,
    content: &'a str,
}

/// Encode one frame as JSON text
#[must_use]
pub fn encode_frame(kind: FrameType, content: &str) -> String {
    serde_json::to_value(WireFrame {
        message_type: kind,
        content,
    })
    .map(|v| v.to_string())
    .unwrap_or_default()
}

/// One step of a reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outgoing {
    /// A frame
    Frame(FrameType, String),
    /// Raw text, not frame-encoded
    Raw(String),
    /// Close the connection
    Close,
}

impl Outgoing {
    /// Wire text, if this step sends anything
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Frame(kind, content) => Some(encode_frame(*kind, content)),
            Self::Raw(raw) => Some(raw.clone()),
            Self::Close => None,
        }
    }
}

/// Plan the reply to one user message
#[must_use]
pub fn plan_reply(config: &StubConfig, message: &str) -> Vec<Outgoing> {
    let message = message.trim();

    if let Some(text) = directive(message, "/error") {
        return vec![Outgoing::Frame(FrameType::Error, text.to_string())];
    }
    if let Some(text) = directive(message, "/info") {
        return vec![Outgoing::Frame(FrameType::Info, text.to_string())];
    }
    if let Some(payload) = directive(message, "/raw") {
        return vec![Outgoing::Raw(payload.to_string())];
    }
    if message == "/close" {
        return vec![Outgoing::Close];
    }

    let answer = config
        .replies
        .get(message)
        .cloned()
        .unwrap_or_else(|| format!("You asked: {message}"));

    snapshots(&answer)
        .into_iter()
        .map(|s| Outgoing::Frame(FrameType::ChatResponse, s))
        .collect()
}

fn directive<'a>(message: &'a str, name: &str) -> Option<&'a str> {
    let rest = message.strip_prefix(name)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix(' ')
    }
}

/// Cumulative word-by-word snapshots of `answer`
#[must_use]
pub fn snapshots(answer: &str) -> Vec<String> {
    let words: Vec<&str> = answer.split_whitespace().collect();
    if words.is_empty() {
        return vec![String::new()];
    }
    (1..=words.len()).map(|n| words[..n].join(" ")).collect()
}
