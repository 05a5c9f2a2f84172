//! Stream assembler: turns delivered text fragments into one growing message.
//!
//! The assembler owns the conversation's [`MessageList`] and republishes an
//! immutable [`MessageSnapshot`] on a `watch` channel after every mutation.
//! Fragments for a handle are applied strictly in call order; there is one
//! producer per handle and the assembler never reorders, trims or merges.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use crate::chat::ids::{ConversationId, MessageId};
use crate::chat::message::{Message, MessageKind, Role};
use crate::chat::message_list::{MessageList, MessageSnapshot};

/// Errors raised when a handle is used incorrectly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    /// The message was removed from the list.
    #[error("message {0} is not in the list")]
    UnknownMessage(MessageId),
    /// The message was already finished.
    #[error("message {0} is already complete")]
    AlreadyComplete(MessageId),
}

/// Reference to an in-progress message returned by [`StreamAssembler::begin`].
///
/// Not `Clone`: finishing, failing or discarding consumes it, so no fragment
/// can be appended after completion through the same handle.
#[derive(Debug, PartialEq, Eq)]
pub struct MessageHandle {
    id: MessageId,
}

impl MessageHandle {
    /// Identifier of the message being assembled.
    #[must_use]
    pub const fn id(&self) -> &MessageId {
        &self.id
    }
}

/// Owner of a conversation's message list.
#[derive(Debug)]
pub struct StreamAssembler {
    list: MessageList,
    published: HashSet<MessageId>,
    new_ids: Arc<HashSet<MessageId>>,
    version: u64,
    tx: watch::Sender<MessageSnapshot>,
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAssembler {
    /// Create an assembler with an empty list.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(MessageSnapshot::default());
        Self {
            list: MessageList::new(),
            published: HashSet::new(),
            new_ids: Arc::default(),
            version: 0,
            tx,
        }
    }

    /// Replace the list with stored history.
    ///
    /// History goes in as one bulk insert and nothing is flagged as newly
    /// arrived, whatever the roles.
    pub fn seed_history(&mut self, messages: Vec<Message>) {
        self.list = MessageList::from_history(messages);
        self.published = self.list.ids();
        self.new_ids = Arc::default();
        debug!(count = self.list.len(), "seeded message history");
        self.publish();
    }

    /// Subscribe to snapshots. The receiver starts at the latest one.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MessageSnapshot> {
        self.tx.subscribe()
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MessageSnapshot {
        self.tx.borrow().clone()
    }

    /// Current list.
    #[must_use]
    pub const fn messages(&self) -> &MessageList {
        &self.list
    }

    /// Append a complete message (the user's own input, or an answer that
    /// arrived in one piece) and return its id.
    pub fn push(&mut self, message: Message) -> MessageId {
        let id = message.id.clone();
        self.list.push(message);
        self.publish();
        id
    }

    /// Start a new empty message at the end of the list.
    pub fn begin(
        &mut self,
        role: Role,
        kind: MessageKind,
        conversation_id: Option<ConversationId>,
    ) -> MessageHandle {
        let message = Message::pending(role, kind, conversation_id);
        let id = message.id.clone();
        self.list.push(message);
        self.publish();
        MessageHandle { id }
    }

    /// Concatenate `fragment` onto the message's content.
    ///
    /// # Errors
    /// Returns an error if the message is gone or already complete.
    pub fn append(&mut self, handle: &MessageHandle, fragment: &str) -> Result<(), AssembleError> {
        self.mutate(&handle.id, |message| message.content.push_str(fragment))
    }

    /// Mark the message complete; no more fragments will arrive.
    ///
    /// # Errors
    /// Returns an error if the message is gone or already complete.
    pub fn finish(&mut self, handle: MessageHandle) -> Result<(), AssembleError> {
        self.mutate(&handle.id, |message| message.complete = true)
    }

    /// Finish a message whose stream broke off.
    ///
    /// Partial content is kept and `notice` is appended after it; an empty
    /// message gets the notice alone.
    ///
    /// # Errors
    /// Returns an error if the message is gone or already complete.
    pub fn fail(&mut self, handle: MessageHandle, notice: &str) -> Result<(), AssembleError> {
        self.mutate(&handle.id, |message| {
            if !message.content.is_empty() && !message.content.ends_with('\n') {
                message.content.push_str("\n\n");
            }
            message.content.push_str(notice);
            message.complete = true;
        })
    }

    /// Drop a message that will never be shown.
    ///
    /// # Errors
    /// Returns an error if the message is gone.
    pub fn discard(&mut self, handle: MessageHandle) -> Result<(), AssembleError> {
        self.list
            .remove(&handle.id)
            .ok_or_else(|| AssembleError::UnknownMessage(handle.id.clone()))?;
        self.publish();
        Ok(())
    }

    /// Remove any message by id. Returns whether it was present.
    pub fn remove(&mut self, id: &MessageId) -> bool {
        let removed = self.list.remove(id).is_some();
        if removed {
            self.publish();
        }
        removed
    }

    /// Back-fill the conversation id on messages created before it was known.
    pub fn set_conversation_id(&mut self, conversation_id: &ConversationId) {
        let missing: Vec<MessageId> = self
            .list
            .iter()
            .filter(|m| m.conversation_id.is_none())
            .map(|m| m.id.clone())
            .collect();
        if missing.is_empty() {
            return;
        }
        for id in &missing {
            self.list.update(id, |message| {
                message.conversation_id = Some(conversation_id.clone());
            });
        }
        self.publish();
    }

    fn mutate<F>(&mut self, id: &MessageId, f: F) -> Result<(), AssembleError>
    where
        F: FnOnce(&mut Message),
    {
        let message = self
            .list
            .get(id)
            .ok_or_else(|| AssembleError::UnknownMessage(id.clone()))?;
        if message.complete {
            return Err(AssembleError::AlreadyComplete(id.clone()));
        }
        self.list.update(id, f);
        self.publish();
        Ok(())
    }

    /// The arrival set is shared with every snapshot and only rebuilt when a
    /// message arrives or a flagged one leaves the list.
    fn publish(&mut self) {
        let arrivals = self.list.arrivals_since(&self.published);
        let live = self.list.ids();
        if !arrivals.is_empty() || self.new_ids.iter().any(|id| !live.contains(id)) {
            let mut new_ids: HashSet<MessageId> = self
                .new_ids
                .iter()
                .filter(|id| live.contains(*id))
                .cloned()
                .collect();
            for id in arrivals {
                debug!(%id, "message arrived");
                new_ids.insert(id);
            }
            self.new_ids = Arc::new(new_ids);
        }
        self.published = live;
        self.version += 1;
        self.tx.send_replace(MessageSnapshot {
            messages: self.list.to_vec(),
            new_ids: Arc::clone(&self.new_ids),
            version: self.version,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant(assembler: &mut StreamAssembler) -> MessageHandle {
        assembler.begin(Role::Assistant, MessageKind::Plain, None)
    }

    #[test]
    fn test_fragments_concatenate_in_order() {
        let mut assembler = StreamAssembler::new();
        let handle = assistant(&mut assembler);
        for fragment in ["Hel", "lo ", "world"] {
            assembler.append(&handle, fragment).unwrap();
        }
        let id = handle.id().clone();
        assembler.finish(handle).unwrap();

        let snapshot = assembler.snapshot();
        let message = snapshot.get(&id).unwrap();
        assert_eq!(message.content, "Hello world");
        assert!(message.complete);
    }

    #[test]
    fn test_no_trimming_or_dedup() {
        let mut assembler = StreamAssembler::new();
        let handle = assistant(&mut assembler);
        for fragment in [" a", " a", "", "\n", "  "] {
            assembler.append(&handle, fragment).unwrap();
        }
        let snapshot = assembler.snapshot();
        assert_eq!(snapshot.get(handle.id()).unwrap().content, " a a\n  ");
    }

    #[test]
    fn test_append_keeps_other_messages_identical() {
        let mut assembler = StreamAssembler::new();
        assembler.push(Message::user("hi", MessageKind::Plain, None));
        let handle = assistant(&mut assembler);
        let before = assembler.snapshot();
        assembler.append(&handle, "x").unwrap();
        let after = assembler.snapshot();

        assert!(Arc::ptr_eq(&before.messages[0], &after.messages[0]));
        assert!(!Arc::ptr_eq(&before.messages[1], &after.messages[1]));
        assert!(after.version > before.version);
    }

    #[test]
    fn test_new_arrivals_flagged_for_non_user_only() {
        let mut assembler = StreamAssembler::new();
        let user_id = assembler.push(Message::user("q", MessageKind::Plain, None));
        let handle = assistant(&mut assembler);
        assembler.append(&handle, "a").unwrap();

        let snapshot = assembler.snapshot();
        assert!(!snapshot.is_new(&user_id));
        assert!(snapshot.is_new(handle.id()));
        assert_eq!(snapshot.new_ids.len(), 1);
    }

    #[test]
    fn test_arrival_set_shared_while_streaming() {
        let mut assembler = StreamAssembler::new();
        let handle = assistant(&mut assembler);
        let before = assembler.snapshot();
        assembler.append(&handle, "a").unwrap();
        assembler.append(&handle, "b").unwrap();
        let after = assembler.snapshot();

        assert!(Arc::ptr_eq(&before.new_ids, &after.new_ids));
        assert!(after.is_new(handle.id()));
    }

    #[test]
    fn test_removed_ids_leave_arrival_set() {
        let mut assembler = StreamAssembler::new();
        let kept = assistant(&mut assembler);
        let dropped = assistant(&mut assembler);
        let dropped_id = dropped.id().clone();
        assembler.discard(dropped).unwrap();

        let snapshot = assembler.snapshot();
        assert!(!snapshot.is_new(&dropped_id));
        assert!(snapshot.is_new(kept.id()));
        assert_eq!(snapshot.new_ids.len(), 1);

        assembler.push(Message {
            id: dropped_id.clone(),
            ..Message::assistant_text("again", MessageKind::Plain, None)
        });
        assert!(assembler.snapshot().is_new(&dropped_id));
    }

    #[test]
    fn test_history_is_never_new() {
        let mut assembler = StreamAssembler::new();
        assembler.seed_history(vec![
            Message::user("q", MessageKind::Plain, None),
            Message::assistant_text("a", MessageKind::Plain, None),
        ]);
        let snapshot = assembler.snapshot();
        assert_eq!(snapshot.messages.len(), 2);
        assert!(snapshot.new_ids.is_empty());
    }

    #[test]
    fn test_fail_keeps_partial_content() {
        let mut assembler = StreamAssembler::new();
        let handle = assistant(&mut assembler);
        let id = handle.id().clone();
        assembler.append(&handle, "Partial answer").unwrap();
        assembler.fail(handle, "warning").unwrap();

        let snapshot = assembler.snapshot();
        let message = snapshot.get(&id).unwrap();
        assert!(message.content.starts_with("Partial answer"));
        assert!(message.content.ends_with("warning"));
        assert!(message.complete);
    }

    #[test]
    fn test_fail_on_empty_uses_notice_alone() {
        let mut assembler = StreamAssembler::new();
        let handle = assistant(&mut assembler);
        let id = handle.id().clone();
        assembler.fail(handle, "warning").unwrap();
        assert_eq!(assembler.snapshot().get(&id).unwrap().content, "warning");
    }

    #[test]
    fn test_done_without_fragments_leaves_empty_content() {
        let mut assembler = StreamAssembler::new();
        let handle = assistant(&mut assembler);
        let id = handle.id().clone();
        assembler.finish(handle).unwrap();
        let snapshot = assembler.snapshot();
        let message = snapshot.get(&id).unwrap();
        assert!(message.content.is_empty());
        assert!(message.complete);
    }

    #[test]
    fn test_append_after_removal_is_an_error() {
        let mut assembler = StreamAssembler::new();
        let handle = assistant(&mut assembler);
        assert!(assembler.remove(handle.id()));
        assert_eq!(
            assembler.append(&handle, "late"),
            Err(AssembleError::UnknownMessage(handle.id().clone()))
        );
    }

    #[test]
    fn test_discard_removes_message() {
        let mut assembler = StreamAssembler::new();
        let handle = assistant(&mut assembler);
        assembler.discard(handle).unwrap();
        assert!(assembler.messages().is_empty());
    }

    #[test]
    fn test_conversation_id_backfill() {
        let mut assembler = StreamAssembler::new();
        let user_id = assembler.push(Message::user("q", MessageKind::Plain, None));
        let conversation = ConversationId::new("c1");
        assembler.set_conversation_id(&conversation);
        let snapshot = assembler.snapshot();
        assert_eq!(
            snapshot.get(&user_id).unwrap().conversation_id,
            Some(conversation)
        );
    }

    #[tokio::test]
    async fn test_subscribers_see_every_growth_step() {
        let mut assembler = StreamAssembler::new();
        let mut rx = assembler.subscribe();
        let handle = assistant(&mut assembler);
        rx.borrow_and_update();

        assembler.append(&handle, "a").unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().get(handle.id()).unwrap().content, "a");
    }
}
