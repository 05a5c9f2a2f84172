//! Per-message reveal state machine.
//!
//! A message is either shown whole (`Instant`), revealed one character per
//! tick (`Animating`), or fully revealed after animating (`Done`). The state
//! only counts characters; it never holds the text itself, so the same state
//! can be applied to whatever the current content is.

use crate::chat::message::Role;

/// Phase of a message's reveal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RevealPhase {
    /// Whole content visible, tracking growth without lag.
    Instant,
    /// Revealing one character per tick.
    Animating,
    /// Caught up after animating; re-enters `Animating` if content grows.
    Done,
}

impl RevealPhase {
    /// Stable string form for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Instant => "instant",
            Self::Animating => "animating",
            Self::Done => "done",
        }
    }
}

/// Result of one tick.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TickOutcome {
    /// One more character became visible; more remain.
    Advanced(usize),
    /// The visible prefix reached the content length.
    Finished(usize),
    /// Nothing to do in the current phase.
    Idle,
}

/// Reveal progress of a single message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RevealState {
    visible_len: usize,
    target_len: usize,
    phase: RevealPhase,
    generation: u64,
}

impl RevealState {
    /// Whether a message should animate.
    ///
    /// User messages never animate. Anything else animates when it arrived
    /// during this session, or when it is the first answer of a conversation
    /// that was just created.
    #[must_use]
    pub const fn eligible(role: Role, newly_arrived: bool, first_in_new_conversation: bool) -> bool {
        !matches!(role, Role::User) && (newly_arrived || first_in_new_conversation)
    }

    /// Initial state for `content`.
    #[must_use]
    pub fn new(animate: bool, content: &str) -> Self {
        let target_len = content.chars().count();
        if animate {
            Self {
                visible_len: 0,
                target_len,
                phase: RevealPhase::Animating,
                generation: 0,
            }
        } else {
            Self {
                visible_len: target_len,
                target_len,
                phase: RevealPhase::Instant,
                generation: 0,
            }
        }
    }

    /// Advance by one character.
    ///
    /// Never moves past the content length. An animating message with nothing
    /// left to reveal (including empty content) finishes on this tick.
    pub fn tick(&mut self) -> TickOutcome {
        if self.phase != RevealPhase::Animating {
            return TickOutcome::Idle;
        }
        if self.visible_len < self.target_len {
            self.visible_len += 1;
        }
        if self.visible_len >= self.target_len {
            self.phase = RevealPhase::Done;
            TickOutcome::Finished(self.visible_len)
        } else {
            TickOutcome::Advanced(self.visible_len)
        }
    }

    /// Retarget after the content value changed.
    ///
    /// Bumps the generation so ticks scheduled for the previous value no-op.
    /// `Instant` jumps to the new length; `Done` re-enters `Animating` when
    /// there is more to reveal. Revealed progress is kept. Returns whether the
    /// state now needs ticks.
    pub fn restart(&mut self, content: &str) -> bool {
        self.generation = self.generation.wrapping_add(1);
        self.target_len = content.chars().count();
        self.visible_len = self.visible_len.min(self.target_len);
        match self.phase {
            RevealPhase::Instant => {
                self.visible_len = self.target_len;
                false
            }
            RevealPhase::Done if self.visible_len < self.target_len => {
                self.phase = RevealPhase::Animating;
                true
            }
            RevealPhase::Done => false,
            RevealPhase::Animating => true,
        }
    }

    /// Invalidate pending ticks without changing progress.
    pub const fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    /// Jump to the end, as if every tick had already run.
    pub const fn complete(&mut self) {
        self.visible_len = self.target_len;
        if matches!(self.phase, RevealPhase::Animating) {
            self.phase = RevealPhase::Done;
        }
    }

    /// Visible prefix of `content`, cut on a character boundary.
    #[must_use]
    pub fn visible<'a>(&self, content: &'a str) -> &'a str {
        content
            .char_indices()
            .nth(self.visible_len)
            .map_or(content, |(end, _)| &content[..end])
    }

    /// Number of visible characters.
    #[must_use]
    pub const fn visible_len(&self) -> usize {
        self.visible_len
    }

    /// Character count the reveal is heading to.
    #[must_use]
    pub const fn target_len(&self) -> usize {
        self.target_len
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> RevealPhase {
        self.phase
    }

    /// Current generation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether ticks are still needed.
    #[must_use]
    pub const fn is_animating(&self) -> bool {
        matches!(self.phase, RevealPhase::Animating)
    }

    /// Whether everything known so far is visible.
    #[must_use]
    pub const fn is_caught_up(&self) -> bool {
        self.visible_len == self.target_len && !self.is_animating()
    }
}
