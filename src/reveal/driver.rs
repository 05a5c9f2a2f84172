//! Timer-driven reveal of one message.
//!
//! A driver owns at most one tokio task. The task waits the initial delay,
//! then ticks the shared [`RevealState`] once per tick delay until the reveal
//! finishes. Each tick runs under the generation it was started with; a tick
//! that finds a newer generation leaves the state untouched and stops.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::reveal::animator::{RevealState, TickOutcome};

/// Delays used by the reveal timer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RevealTiming {
    /// Wait before the first character appears.
    #[serde(with = "crate::config::duration_ms")]
    pub initial_delay: Duration,
    /// Wait between two characters.
    #[serde(with = "crate::config::duration_ms")]
    pub tick: Duration,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            tick: Duration::from_millis(2),
        }
    }
}

/// Drives a [`RevealState`] on tokio timers and publishes every step.
#[derive(Debug)]
pub struct RevealDriver {
    state: Arc<watch::Sender<RevealState>>,
    timing: RevealTiming,
    task: Option<JoinHandle<()>>,
}

impl RevealDriver {
    /// Take ownership of `state` and start ticking if it is animating.
    ///
    /// Outside a tokio runtime there is nothing to schedule ticks on, so an
    /// animating state is completed immediately instead.
    #[must_use]
    pub fn start(state: RevealState, timing: RevealTiming) -> Self {
        let (tx, _rx) = watch::channel(state);
        let mut driver = Self {
            state: Arc::new(tx),
            timing,
            task: None,
        };
        driver.schedule();
        driver
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RevealState {
        self.state.borrow().clone()
    }

    /// Subscribe to progress.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RevealState> {
        self.state.subscribe()
    }

    /// The message content changed value.
    ///
    /// Pending ticks of the previous run are invalidated; a new run starts if
    /// there is more to reveal.
    pub fn sync(&mut self, content: &str) {
        let mut needs_ticks = false;
        self.state.send_modify(|state| needs_ticks = state.restart(content));
        self.abort_task();
        if needs_ticks {
            self.schedule();
        }
    }

    /// Reveal everything now and stop ticking.
    pub fn skip_to_end(&mut self) {
        self.abort_task();
        self.state.send_modify(|state| {
            state.invalidate();
            state.complete();
        });
    }

    /// Stop ticking and invalidate anything still pending.
    pub fn cancel(&mut self) {
        if self.task.is_some() {
            debug!("reveal cancelled");
        }
        self.abort_task();
        self.state.send_modify(RevealState::invalidate);
    }

    /// Whether a tick task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    fn schedule(&mut self) {
        let state = self.state.borrow().clone();
        if !state.is_animating() {
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                let tx = Arc::clone(&self.state);
                let timing = self.timing;
                let generation = state.generation();
                self.task = Some(handle.spawn(run_reveal(tx, generation, timing)));
            }
            Err(_) => {
                debug!("no runtime for reveal ticks, revealing instantly");
                self.state.send_modify(RevealState::complete);
            }
        }
    }

    fn abort_task(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RevealDriver {
    fn drop(&mut self) {
        self.abort_task();
    }
}

async fn run_reveal(tx: Arc<watch::Sender<RevealState>>, generation: u64, timing: RevealTiming) {
    tokio::time::sleep(timing.initial_delay).await;
    loop {
        let mut stale = false;
        let mut finished = false;
        tx.send_if_modified(|state| {
            if state.generation() != generation {
                stale = true;
                return false;
            }
            match state.tick() {
                TickOutcome::Advanced(_) => true,
                TickOutcome::Finished(_) => {
                    finished = true;
                    true
                }
                TickOutcome::Idle => {
                    finished = true;
                    false
                }
            }
        });
        if stale {
            debug!(generation, "dropping stale reveal tick");
            return;
        }
        if finished {
            return;
        }
        tokio::time::sleep(timing.tick).await;
    }
}
