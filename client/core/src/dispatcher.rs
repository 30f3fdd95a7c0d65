//! Message Dispatcher
//!
//! The single entry point for user submissions. A message goes out only
//! when the connection is open and no reply is outstanding; anything else
//! is rejected without side effects. Surfaces are expected to disable
//! their input from the same two flags, so a rejection here is not an
//! error the user sees.

use std::fmt;

use crate::connection::ConnectionManager;
use crate::conversation::ConversationState;

/// Why a submission was not sent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// No open connection
    NotOpen,
    /// A reply to the previous message is still outstanding
    ReplyPending,
    /// Nothing but whitespace
    EmptyMessage,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotOpen => "not connected",
            Self::ReplyPending => "waiting for a reply",
            Self::EmptyMessage => "empty message",
        };
        f.write_str(text)
    }
}

/// Result of a submission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the connection; a reply placeholder is pending
    Sent,
    /// Dropped without side effects
    Rejected(RejectReason),
}

impl SendOutcome {
    /// Whether the message went out
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Guards submissions against connection and pending state
pub struct MessageDispatcher<'a> {
    connection: &'a ConnectionManager,
    conversation: &'a mut ConversationState,
}

impl<'a> MessageDispatcher<'a> {
    /// Dispatcher over a session's connection and conversation
    pub fn new(connection: &'a ConnectionManager, conversation: &'a mut ConversationState) -> Self {
        Self {
            connection,
            conversation,
        }
    }

    /// Check whether `text` may be sent right now
    #[must_use]
    pub fn check(&self, text: &str) -> Option<RejectReason> {
        if !self.connection.status().is_open() {
            Some(RejectReason::NotOpen)
        } else if self.conversation.is_pending() {
            Some(RejectReason::ReplyPending)
        } else if text.trim().is_empty() {
            Some(RejectReason::EmptyMessage)
        } else {
            None
        }
    }

    /// Submit `text`
    ///
    /// On success the trimmed text is on the wire and the transcript holds
    /// the text as typed followed by an empty placeholder.
    pub fn send(self, text: &str) -> SendOutcome {
        if let Some(reason) = self.check(text) {
            tracing::debug!(%reason, "Send rejected");
            return SendOutcome::Rejected(reason);
        }

        let trimmed = text.trim();
        if let Err(e) = self.connection.send(trimmed) {
            tracing::warn!(error = %e, "Send failed; connection unusable");
            return SendOutcome::Rejected(RejectReason::NotOpen);
        }

        if self.conversation.submit_user_message(text).is_none() {
            tracing::warn!("Conversation refused a message the dispatcher accepted");
        }

        SendOutcome::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CloseReason, ConnectionEvent};
    use crate::test_utils::MockConnector;
    use crate::token::Token;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct Fixture {
        connector: Arc<MockConnector>,
        connection: ConnectionManager,
        conversation: ConversationState,
        _events: mpsc::Receiver<ConnectionEvent>,
    }

    fn fixture(open: bool) -> Fixture {
        let connector = Arc::new(MockConnector::new());
        let (tx, rx) = mpsc::channel(16);
        let mut connection = ConnectionManager::new("ws://host/chat", connector.clone(), tx);
        let id = connection.connect(Token::new("T").unwrap()).unwrap();
        if open {
            connection.observe(ConnectionEvent::Opened { id });
        }
        Fixture {
            connector,
            connection,
            conversation: ConversationState::default(),
            _events: rx,
        }
    }

    impl Fixture {
        fn send(&mut self, text: &str) -> SendOutcome {
            MessageDispatcher::new(&self.connection, &mut self.conversation).send(text)
        }
    }

    #[test]
    fn test_send_when_open() {
        let mut f = fixture(true);

        assert_eq!(f.send("  What is X? "), SendOutcome::Sent);
        assert_eq!(f.connector.sent(0), vec!["What is X?".to_string()]);
        assert_eq!(f.conversation.len(), 3);
        assert!(f.conversation.is_pending());
    }

    #[test]
    fn test_rejected_while_connecting() {
        let mut f = fixture(false);

        assert_eq!(f.send("hi"), SendOutcome::Rejected(RejectReason::NotOpen));
        assert!(f.connector.sent(0).is_empty());
        assert_eq!(f.conversation.len(), 1);
    }

    #[test]
    fn test_rejected_while_pending() {
        let mut f = fixture(true);
        f.send("first");

        assert_eq!(
            f.send("second"),
            SendOutcome::Rejected(RejectReason::ReplyPending)
        );
        assert_eq!(f.connector.sent(0), vec!["first".to_string()]);
        assert_eq!(f.conversation.len(), 3);
    }

    #[test]
    fn test_rejected_when_empty() {
        let mut f = fixture(true);

        assert_eq!(
            f.send("   "),
            SendOutcome::Rejected(RejectReason::EmptyMessage)
        );
        assert!(f.connector.sent(0).is_empty());
        assert!(!f.conversation.is_pending());
    }

    #[test]
    fn test_rejected_after_close() {
        let mut f = fixture(true);
        let id = f.connector.id(0);
        f.connection.observe(ConnectionEvent::Closed {
            id,
            reason: CloseReason::Local,
        });

        assert_eq!(f.send("hi"), SendOutcome::Rejected(RejectReason::NotOpen));
        assert_eq!(f.conversation.len(), 1);
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(SendOutcome::Sent.is_sent());
        assert!(!SendOutcome::Rejected(RejectReason::EmptyMessage).is_sent());
        assert_eq!(RejectReason::ReplyPending.to_string(), "waiting for a reply");
    }
}
