//! Typewriter reveal of message content.
//!
//! - `animator`: the per-message state machine
//! - `driver`: tokio timers that tick the state machine

pub mod animator;
pub mod driver;

pub use animator::{RevealPhase, RevealState, TickOutcome};
pub use driver::{RevealDriver, RevealTiming};
