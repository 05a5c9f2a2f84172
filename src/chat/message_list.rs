//! Ordered message list and the snapshots published to observers.

use std::collections::HashSet;
use std::sync::Arc;

use crate::chat::ids::MessageId;
use crate::chat::message::Message;

/// Immutable view of a conversation's messages at one publish.
///
/// Messages are shared through `Arc`: a message that did not change between
/// two snapshots is pointer-identical in both, so observers can find the
/// changed one with [`Arc::ptr_eq`].
#[derive(Clone, Debug, Default)]
pub struct MessageSnapshot {
    /// Messages in insertion order.
    pub messages: Vec<Arc<Message>>,
    /// Ids flagged as newly arrived during this session.
    pub new_ids: Arc<HashSet<MessageId>>,
    /// Publish counter, incremented on every change.
    pub version: u64,
}

impl MessageSnapshot {
    /// Look up a message by id.
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Arc<Message>> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Whether the message was flagged as newly arrived.
    #[must_use]
    pub fn is_new(&self, id: &MessageId) -> bool {
        self.new_ids.contains(id)
    }

    /// Last message, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Arc<Message>> {
        self.messages.last()
    }
}

/// Insertion-ordered list of messages; never re-sorted.
#[derive(Clone, Debug, Default)]
pub struct MessageList {
    messages: Vec<Arc<Message>>,
}

impl MessageList {
    /// Create an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Build a list from stored history, keeping the given order.
    #[must_use]
    pub fn from_history(messages: impl IntoIterator<Item = Message>) -> Self {
        Self {
            messages: messages
                .into_iter()
                .map(|mut m| {
                    m.complete = true;
                    Arc::new(m)
                })
                .collect(),
        }
    }

    /// Append a message at the end.
    pub fn push(&mut self, message: Message) {
        self.messages.push(Arc::new(message));
    }

    /// Look up a message by id.
    #[must_use]
    pub fn get(&self, id: &MessageId) -> Option<&Arc<Message>> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Apply `f` to a copy of the identified message and swap the copy in.
    ///
    /// Every other entry keeps its `Arc` untouched. Returns `None` when the
    /// id is unknown.
    pub fn update<F>(&mut self, id: &MessageId, f: F) -> Option<Arc<Message>>
    where
        F: FnOnce(&mut Message),
    {
        let slot = self.messages.iter_mut().find(|m| &m.id == id)?;
        let mut next = Message::clone(&**slot);
        f(&mut next);
        *slot = Arc::new(next);
        Some(Arc::clone(slot))
    }

    /// Remove a message, returning it if present.
    pub fn remove(&mut self, id: &MessageId) -> Option<Arc<Message>> {
        let index = self.messages.iter().position(|m| &m.id == id)?;
        Some(self.messages.remove(index))
    }

    /// Ids currently in the list.
    #[must_use]
    pub fn ids(&self) -> HashSet<MessageId> {
        self.messages.iter().map(|m| m.id.clone()).collect()
    }

    /// Ids of non-user messages absent from `previous`, in list order.
    #[must_use]
    pub fn arrivals_since(&self, previous: &HashSet<MessageId>) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|m| !m.is_user() && !previous.contains(&m.id))
            .map(|m| m.id.clone())
            .collect()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Message>> {
        self.messages.iter()
    }

    /// Clone the shared handles for publishing.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Arc<Message>> {
        self.messages.clone()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
