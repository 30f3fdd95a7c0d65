//! Display State
//!
//! The session publishes whole transcript snapshots; a terminal can only
//! append. `TranscriptView` remembers what has been printed and yields only
//! the turns that are new or whose text changed since.

use docchat_core::{Alert, SessionPhase, TranscriptSnapshot, TurnRole};

/// Placeholder shown while a reply is outstanding
pub const LOADING_INDICATOR: &str = "…";

/// How a line relates to what was printed before
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// First time this turn is shown
    New,
    /// The turn was shown before with different text
    Revised,
    /// A reply is outstanding for this turn
    Loading,
}

/// A turn ready to print
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayLine {
    /// Who the turn belongs to
    pub role: TurnRole,
    /// Turn text
    pub text: String,
    /// Relation to earlier output
    pub kind: LineKind,
}

impl DisplayLine {
    /// Render wrapped to `width` columns
    #[must_use]
    pub fn render(&self, width: usize) -> String {
        let label = match self.role {
            TurnRole::Agent => "agent",
            TurnRole::User => "  you",
        };
        let marker = match self.kind {
            LineKind::Revised => "~",
            LineKind::New | LineKind::Loading => ":",
        };
        let text = match self.kind {
            LineKind::Loading => LOADING_INDICATOR,
            LineKind::New | LineKind::Revised => self.text.as_str(),
        };

        let initial = format!("{label}{marker} ");
        let subsequent = " ".repeat(initial.chars().count());
        let options = textwrap::Options::new(width.max(initial.len() + 1))
            .initial_indent(&initial)
            .subsequent_indent(&subsequent);
        textwrap::fill(text, options)
    }
}

/// What has been printed of the transcript so far
#[derive(Debug, Default)]
pub struct TranscriptView {
    shown: Vec<String>,
}

impl TranscriptView {
    /// Nothing printed yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print to bring the terminal up to `snapshot`
    pub fn update(&mut self, snapshot: &TranscriptSnapshot) -> Vec<DisplayLine> {
        let mut lines = Vec::new();

        for turn in snapshot.turns() {
            if turn.loading {
                if self.shown.len() <= turn.index {
                    self.shown.push(String::new());
                    lines.push(DisplayLine {
                        role: turn.role,
                        text: String::new(),
                        kind: LineKind::Loading,
                    });
                }
                continue;
            }

            let kind = match self.shown.get_mut(turn.index) {
                Some(prev) if prev == turn.text => continue,
                Some(prev) => {
                    let kind = if prev.is_empty() {
                        LineKind::New
                    } else {
                        LineKind::Revised
                    };
                    turn.text.clone_into(prev);
                    kind
                }
                None => {
                    self.shown.push(turn.text.to_string());
                    LineKind::New
                }
            };

            lines.push(DisplayLine {
                role: turn.role,
                text: turn.text.to_string(),
                kind,
            });
        }

        lines
    }
}

/// One-line notice for a phase change, if the user should see it
#[must_use]
pub fn phase_notice(phase: SessionPhase) -> Option<&'static str> {
    match phase {
        SessionPhase::NoToken => Some("[waiting for a token]"),
        SessionPhase::Connecting => Some("[connecting]"),
        SessionPhase::Open => Some("[connected]"),
        SessionPhase::Closed => Some("[disconnected]"),
        SessionPhase::TornDown => None,
    }
}

/// Render an alert
#[must_use]
pub fn render_alert(alert: &Alert, width: usize) -> String {
    let initial = format!("! [{}] ", alert.id);
    let subsequent = " ".repeat(initial.chars().count());
    let options = textwrap::Options::new(width.max(initial.len() + 1))
        .initial_indent(&initial)
        .subsequent_indent(&subsequent);
    textwrap::fill(&alert.text, options)
}
