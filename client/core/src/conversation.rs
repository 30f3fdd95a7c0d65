//! Conversation State
//!
//! The transcript of one chat session and the single pending-reply slot.
//!
//! # Shape
//!
//! The transcript is a flat list of turn texts whose roles follow from
//! position: index 0 is the agent's greeting, then user and agent turns
//! alternate. Submitting a message appends two entries, the user's text
//! and an empty placeholder for the reply, and the placeholder is later
//! overwritten in place. Entries are never removed.
//!
//! ```text
//! ["Hello, how can I help?"]                          idle
//! ["Hello, how can I help?", "What is X?", ""]        pending
//! ["Hello, how can I help?", "What is X?", "X is Y"]  resolved
//! ```
//!
//! While a reply is pending no further message can be submitted.

use serde::{Deserialize, Serialize};

/// Greeting used when none is configured
pub const DEFAULT_GREETING: &str = "Hello, how can I help?";

/// Who a turn belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
    /// The remote chat service
    Agent,
    /// The local user
    User,
}

impl TurnRole {
    /// Role of the turn at `index` (even = agent, odd = user)
    #[must_use]
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Self::Agent
        } else {
            Self::User
        }
    }
}

/// Read-only view of one transcript entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Turn<'a> {
    /// Position in the transcript
    pub index: usize,
    /// Who the turn belongs to
    pub role: TurnRole,
    /// Turn text (empty for an unresolved placeholder)
    pub text: &'a str,
    /// Whether a loading indicator belongs on this turn
    pub loading: bool,
}

/// What applying a response did to the transcript
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Filled the pending placeholder
    Resolved,
    /// Nothing was pending; overwrote the latest agent reply
    Revised,
    /// Nothing was pending and no reply exists yet; overwrote the greeting
    Unsolicited,
}

/// Owned copy of the transcript for surfaces
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSnapshot {
    /// Turn texts in order
    pub turns: Vec<String>,
    /// Whether the last turn is an unresolved placeholder
    pub pending: bool,
}

impl TranscriptSnapshot {
    /// Iterate the snapshot as [`Turn`]s
    pub fn turns(&self) -> impl Iterator<Item = Turn<'_>> {
        turns_of(&self.turns, self.pending)
    }

    /// The last turn's text
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.turns.last().map(String::as_str)
    }
}

fn turns_of(transcript: &[String], pending: bool) -> impl Iterator<Item = Turn<'_>> {
    let last = transcript.len().saturating_sub(1);
    transcript.iter().enumerate().map(move |(index, text)| Turn {
        index,
        role: TurnRole::for_index(index),
        text,
        loading: pending && index == last,
    })
}

/// Transcript plus pending flag for one session
#[derive(Clone, Debug)]
pub struct ConversationState {
    transcript: Vec<String>,
    pending: bool,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(DEFAULT_GREETING)
    }
}

impl ConversationState {
    /// Start a conversation with the agent's greeting
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            transcript: vec![greeting.into()],
            pending: false,
        }
    }

    /// Record a user message and open a reply placeholder
    ///
    /// Returns the trimmed text to put on the wire, or `None` (and changes
    /// nothing) if the text is blank or a reply is already pending.
    pub fn submit_user_message(&mut self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() || self.pending {
            return None;
        }

        self.transcript.push(text.to_string());
        self.transcript.push(String::new());
        self.pending = true;

        Some(trimmed.to_string())
    }

    /// Apply a chat response to the last transcript entry
    ///
    /// The last entry is replaced whether or not a reply was pending; a
    /// response with nothing pending is logged and applied anyway.
    pub fn apply_response(&mut self, content: impl Into<String>) -> ResponseOutcome {
        let outcome = if self.pending {
            ResponseOutcome::Resolved
        } else if self.transcript.len() > 1 {
            ResponseOutcome::Revised
        } else {
            ResponseOutcome::Unsolicited
        };

        match outcome {
            ResponseOutcome::Resolved => {}
            ResponseOutcome::Revised => {
                tracing::debug!(turn = self.transcript.len() - 1, "Response revises last reply");
            }
            ResponseOutcome::Unsolicited => {
                tracing::warn!("Response arrived with nothing pending; replacing greeting");
            }
        }

        let content = content.into();
        match self.transcript.last_mut() {
            Some(last) => *last = content,
            None => self.transcript.push(content),
        }
        self.pending = false;

        outcome
    }

    /// Stop waiting for the current reply, leaving its placeholder as-is
    ///
    /// Returns whether a reply was pending.
    pub fn abandon_pending(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }

    /// Whether a reply is outstanding
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Turn texts in order
    #[must_use]
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    /// Always false: the greeting is never removed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    /// The last turn's text
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.transcript.last().map(String::as_str)
    }

    /// Iterate turns with roles and loading state
    pub fn turns(&self) -> impl Iterator<Item = Turn<'_>> {
        turns_of(&self.transcript, self.pending)
    }

    /// Owned copy for surfaces
    #[must_use]
    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            turns: self.transcript.clone(),
            pending: self.pending,
        }
    }
}
