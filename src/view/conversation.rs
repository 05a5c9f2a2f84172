//! Reveal bookkeeping for a whole conversation.
//!
//! `ConversationView` follows the message snapshots published by a session.
//! Each message gets a [`RevealDriver`] the first time it is seen; the
//! snapshot's arrival flags decide whether it animates. When a message's
//! `Arc` changes and its content grew the driver is resynced; content that no
//! longer extends what was shown gets a fresh reveal from the start. When a
//! message disappears its driver is cancelled so no late tick can touch it.

use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::chat::ids::MessageId;
use crate::chat::message::Message;
use crate::chat::message_list::MessageSnapshot;
use crate::config::RevealConfig;
use crate::format::blocks::ContentFormatter;
use crate::reveal::animator::RevealState;
use crate::reveal::driver::{RevealDriver, RevealTiming};
use crate::view::bubble::MessageBubble;

#[derive(Debug)]
struct Tracked {
    message: Arc<Message>,
    driver: RevealDriver,
}

/// Displayed state of one conversation.
#[derive(Debug)]
pub struct ConversationView {
    reveals: DashMap<MessageId, Tracked>,
    current: watch::Sender<MessageSnapshot>,
    formatter: ContentFormatter,
    timing: RevealTiming,
    animate: bool,
    fresh_conversation: bool,
}

impl ConversationView {
    /// Empty view.
    ///
    /// # Errors
    /// Returns an error if the formatter patterns fail to compile.
    pub fn new(config: &RevealConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            reveals: DashMap::new(),
            current: watch::Sender::new(MessageSnapshot::default()),
            formatter: ContentFormatter::new()?,
            timing: config.timing,
            animate: config.enabled,
            fresh_conversation: false,
        })
    }

    /// Mark the conversation as just created: its first answer animates even
    /// when it comes from history.
    #[must_use]
    pub const fn with_fresh_conversation(mut self, fresh: bool) -> Self {
        self.fresh_conversation = fresh;
        self
    }

    /// Follow `snapshot`.
    pub fn apply(&self, snapshot: &MessageSnapshot) {
        let live: HashSet<&MessageId> = snapshot.messages.iter().map(|m| &m.id).collect();
        self.reveals.retain(|id, tracked| {
            let keep = live.contains(id);
            if !keep {
                debug!(message = %id, "message removed, reveal dropped");
                tracked.driver.cancel();
            }
            keep
        });

        for (index, message) in snapshot.messages.iter().enumerate() {
            if let Some(mut tracked) = self.reveals.get_mut(&message.id) {
                if Arc::ptr_eq(&tracked.message, message) {
                    continue;
                }
                if message.content.starts_with(tracked.message.content.as_str()) {
                    tracked.message = Arc::clone(message);
                    tracked.driver.sync(&message.content);
                } else {
                    debug!(message = %message.id, "content replaced, reveal restarted");
                    tracked.driver.cancel();
                    tracked.driver = self.start_reveal(snapshot, index, message);
                    tracked.message = Arc::clone(message);
                }
                continue;
            }
            let driver = self.start_reveal(snapshot, index, message);
            self.reveals.insert(
                message.id.clone(),
                Tracked {
                    message: Arc::clone(message),
                    driver,
                },
            );
        }
        self.current.send_replace(snapshot.clone());
    }

    fn start_reveal(
        &self,
        snapshot: &MessageSnapshot,
        index: usize,
        message: &Message,
    ) -> RevealDriver {
        let first_answer = self.fresh_conversation && index == 1;
        let animate = self.animate
            && RevealState::eligible(message.role, snapshot.is_new(&message.id), first_answer);
        RevealDriver::start(RevealState::new(animate, &message.content), self.timing)
    }

    /// Snapshot last applied.
    #[must_use]
    pub fn snapshot(&self) -> MessageSnapshot {
        self.current.borrow().clone()
    }

    /// Reveal progress of a message.
    #[must_use]
    pub fn reveal_state(&self, id: &MessageId) -> Option<RevealState> {
        self.reveals.get(id).map(|tracked| tracked.driver.state())
    }

    /// Observe the reveal of a message.
    #[must_use]
    pub fn subscribe_reveal(&self, id: &MessageId) -> Option<watch::Receiver<RevealState>> {
        self.reveals.get(id).map(|tracked| tracked.driver.subscribe())
    }

    /// Revealed text of a message.
    #[must_use]
    pub fn visible_text(&self, id: &MessageId) -> Option<String> {
        self.reveals.get(id).map(|tracked| {
            tracked
                .driver
                .state()
                .visible(&tracked.message.content)
                .to_string()
        })
    }

    /// Whether no message is still animating.
    #[must_use]
    pub fn is_caught_up(&self) -> bool {
        self.reveals
            .iter()
            .all(|tracked| tracked.driver.state().is_caught_up())
    }

    /// Reveal every message now.
    pub fn skip_all(&self) {
        for mut tracked in self.reveals.iter_mut() {
            tracked.driver.skip_to_end();
        }
    }

    /// Bubbles in conversation order.
    #[must_use]
    pub fn bubbles<Tz>(&self, now: &DateTime<Tz>) -> Vec<MessageBubble>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let snapshot = self.snapshot();
        snapshot
            .messages
            .iter()
            .filter_map(|message| {
                let state = self.reveal_state(&message.id)?;
                Some(MessageBubble::build(message, &state, &self.formatter, now))
            })
            .collect()
    }

    /// Number of tracked messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reveals.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reveals.is_empty()
    }
}
