//! Placeholder shown while an answer is awaited.

use std::time::Duration;

use tokio::time::Instant;

use crate::chat::message::{Message, Tool};

/// Label of the typing indicator.
pub const TYPING_LABEL: &str = "Hain is crafting response...";

/// Progress lines of the web-search indicator, in order.
pub const SEARCH_PHASES: [&str; 4] = [
    "Initializing search...",
    "Scanning the web...",
    "Processing results...",
    "Crafting response...",
];

/// Which loading placeholder to show below the conversation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadingIndicator {
    /// Generic typing bubble.
    Typing,
    /// Web-search progress, with the query being searched.
    WebSearch {
        /// The user's question.
        query: String,
    },
}

impl LoadingIndicator {
    /// Placeholder for the current state, if any.
    ///
    /// Nothing is shown unless a send is running and the user's message is
    /// still the last one.
    #[must_use]
    pub fn for_state(in_flight: bool, last: Option<&Message>) -> Option<Self> {
        let last = last.filter(|message| in_flight && message.is_user())?;
        if last.kind.tool() == Some(Tool::WebSearch) {
            Some(Self::WebSearch {
                query: last.content.clone(),
            })
        } else {
            Some(Self::Typing)
        }
    }

    /// Text of the placeholder at `phase`.
    #[must_use]
    pub fn label(&self, phase: usize) -> &'static str {
        match self {
            Self::Typing => TYPING_LABEL,
            Self::WebSearch { .. } => SEARCH_PHASES[phase.min(SEARCH_PHASES.len() - 1)],
        }
    }
}

/// Clock for the web-search phases: one step per interval, stopping on the
/// last phase.
#[derive(Clone, Copy, Debug)]
pub struct SearchProgress {
    started: Instant,
    interval: Duration,
}

impl SearchProgress {
    /// Start counting now.
    #[must_use]
    pub fn start(interval: Duration) -> Self {
        Self {
            started: Instant::now(),
            interval,
        }
    }

    /// Phase index at `now`.
    #[must_use]
    pub fn phase_at(&self, now: Instant) -> usize {
        if self.interval.is_zero() {
            return SEARCH_PHASES.len() - 1;
        }
        let elapsed = now.saturating_duration_since(self.started);
        let steps = elapsed.as_millis() / self.interval.as_millis().max(1);
        usize::try_from(steps)
            .unwrap_or(usize::MAX)
            .min(SEARCH_PHASES.len() - 1)
    }

    /// Current phase index.
    #[must_use]
    pub fn phase(&self) -> usize {
        self.phase_at(Instant::now())
    }

    /// Whether the last phase was reached.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.phase() == SEARCH_PHASES.len() - 1
    }
}
