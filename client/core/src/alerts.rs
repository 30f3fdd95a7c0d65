//! Persistent Alerts
//!
//! Error frames from the service become alerts that stay until the user
//! dismisses them. Alerts never block the conversation and never expire.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of one alert within a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlertId(pub u64);

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user-visible alert carrying an error frame's content verbatim
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Alert id
    pub id: AlertId,
    /// Text as sent by the service
    pub text: String,
    /// When the alert was raised
    pub raised_at: DateTime<Utc>,
}

/// Active alerts in the order they were raised
#[derive(Debug, Default)]
pub struct AlertQueue {
    next_id: u64,
    active: Vec<Alert>,
}

impl AlertQueue {
    /// Empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise an alert and return a copy of it
    pub fn raise(&mut self, text: impl Into<String>) -> Alert {
        self.next_id += 1;
        let alert = Alert {
            id: AlertId(self.next_id),
            text: text.into(),
            raised_at: Utc::now(),
        };
        self.active.push(alert.clone());
        alert
    }

    /// Remove an alert; returns it if it was active
    pub fn dismiss(&mut self, id: AlertId) -> Option<Alert> {
        let pos = self.active.iter().position(|a| a.id == id)?;
        Some(self.active.remove(pos))
    }

    /// Alerts still shown
    #[must_use]
    pub fn active(&self) -> &[Alert] {
        &self.active
    }

    /// Number of active alerts
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no alert is active
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
