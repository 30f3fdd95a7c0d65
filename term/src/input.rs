//! User input parsing
//!
//! Local commands start with `:` so that anything else, including text that
//! starts with `/`, reaches the chat service untouched.

use docchat_core::AlertId;

/// One line typed by the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Text to send to the service
    Message(String),
    /// `:alerts` - list active alerts
    ListAlerts,
    /// `:dismiss N` - dismiss alert N
    Dismiss(AlertId),
    /// `:help`
    Help,
    /// `:quit` or `:q`
    Quit,
    /// A blank line
    Blank,
    /// A `:` command that could not be understood
    Invalid(String),
}

impl Input {
    /// Parse one line (without its newline)
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Blank;
        }

        let Some(command) = trimmed.strip_prefix(':') else {
            return Self::Message(line.to_string());
        };

        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("alerts"), None, _) => Self::ListAlerts,
            (Some("help"), None, _) => Self::Help,
            (Some("quit" | "q"), None, _) => Self::Quit,
            (Some("dismiss"), Some(id), None) => id
                .parse()
                .map(|n| Self::Dismiss(AlertId(n)))
                .unwrap_or_else(|_| Self::Invalid(format!("not an alert id: {id}"))),
            _ => Self::Invalid(format!("unknown command: {trimmed}")),
        }
    }
}

/// Help text for `:help`
pub const HELP: &str = "\
:alerts       list active alerts
:dismiss N    dismiss alert N
:quit         leave
anything else is sent as a message";
